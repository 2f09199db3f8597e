//! Error boundary.
//!
//! Gate errors render a production-safe body themselves and leave an
//! [`ErrorReport`] in the response extensions. Outside production this layer
//! swaps the body for one that includes the unredacted message and `stack`.
//! Status and headers (rate-limit headers, cookie removal) are preserved.
//!
//! The boundary sits outside the timeout and body-limit layers, so their
//! refusals and axum's 405 are reshaped into the same JSON body.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::Environment;
use crate::error::{ErrorBody, ErrorReport, GateError};

pub async fn error_boundary(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if response.extensions().get::<ErrorReport>().is_none() && is_unshaped_error(&response) {
        response = reshape(response);
    }
    if environment.is_production() {
        return response;
    }
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let body = ErrorBody {
        success: false,
        status_code: report.status.as_u16(),
        message: report.message,
        stack: Some(report.stack),
    };
    let Ok(bytes) = serde_json::to_vec(&body) else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(bytes))
}

fn is_unshaped_error(response: &Response) -> bool {
    let status = response.status();
    let json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    (status.is_client_error() || status.is_server_error()) && !json
}

/// Render a bare error status as a [`GateError`], keeping headers such as
/// `Allow`.
fn reshape(response: Response) -> Response {
    let (parts, _) = response.into_parts();
    let mut shaped = GateError::rejected(parts.status).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            shaped.headers_mut().append(name.clone(), value.clone());
        }
    }
    shaped
}

/// Fallback for unmatched routes.
pub async fn not_found() -> Response {
    GateError::NotFound.into_response()
}
