//! Failure taxonomy shared by every gate.
//!
//! Gates resolve to exactly one [`GateError`]; the HTTP shaping lives here and
//! in `http::response::error_boundary`, so handlers never build error JSON.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Why a presented credential was rejected as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Structure could not be parsed.
    Malformed,
    /// Integrity tag does not match the claims.
    SignatureInvalid,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Malformed => write!(f, "malformed token"),
            InvalidReason::SignatureInvalid => write!(f, "invalid token signature"),
        }
    }
}

/// Which authorization rule denied the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    RoleRequired,
    NotOwner,
}

impl ForbiddenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForbiddenReason::RoleRequired => "role_required",
            ForbiddenReason::NotOwner => "not_owner",
        }
    }
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenReason::RoleRequired => write!(f, "admin privileges required"),
            ForbiddenReason::NotOwner => write!(f, "you can only modify your own resources"),
        }
    }
}

/// Every way a gated request can be refused.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    #[error("Unauthorized: no token provided")]
    Unauthenticated,

    #[error("Unauthorized: {0}")]
    InvalidSession(InvalidReason),

    #[error("Unauthorized: session expired, please sign in again")]
    SessionExpired,

    #[error("Forbidden: {0}")]
    Forbidden(ForbiddenReason),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited {
        limit: u32,
        /// Seconds until the current window closes.
        reset_after: u64,
    },

    #[error("Resource not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Refusal whose status is decided outside the gates: body limits,
    /// content type, method routing, timeouts.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated
            | GateError::InvalidSession(_)
            | GateError::SessionExpired => StatusCode::UNAUTHORIZED,
            GateError::Forbidden(_) => StatusCode::FORBIDDEN,
            GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::NotFound => StatusCode::NOT_FOUND,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GateError::Rejected { status, .. } => *status,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Unauthenticated => "unauthenticated",
            GateError::InvalidSession(_) => "invalid_session",
            GateError::SessionExpired => "session_expired",
            GateError::Forbidden(_) => "forbidden",
            GateError::RateLimited { .. } => "rate_limited",
            GateError::NotFound => "not_found",
            GateError::BadRequest(_) => "bad_request",
            GateError::Rejected { .. } => "rejected",
            GateError::Internal(_) => "internal",
        }
    }

    /// Message safe to show a client in production.
    pub fn public_message(&self) -> String {
        match self {
            GateError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl GateError {
    /// Wrap a bare status with its canonical reason as the message.
    pub fn rejected(status: StatusCode) -> Self {
        GateError::Rejected {
            status,
            message: status.canonical_reason().unwrap_or("Request failed").to_string(),
        }
    }
}

/// Oversized bodies and wrong content types keep their own status; every other
/// body problem is a bad request.
impl From<JsonRejection> for GateError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            status @ (StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE) => {
                GateError::Rejected {
                    status,
                    message: rejection.body_text(),
                }
            }
            _ => GateError::BadRequest(rejection.body_text()),
        }
    }
}

impl From<crate::clock::ClockError> for GateError {
    fn from(e: crate::clock::ClockError) -> Self {
        GateError::Internal(e.to_string())
    }
}

/// JSON shape of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Unredacted error details carried in the response extensions so the
/// boundary can re-render them outside production.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub stack: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let GateError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal error while gating request");
        }

        let body = ErrorBody {
            success: false,
            status_code: status.as_u16(),
            message: self.public_message(),
            stack: None,
        };
        let mut response = (status, Json(body)).into_response();

        if let GateError::RateLimited { limit, reset_after } = &self {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*reset_after));
            headers.insert("ratelimit-limit", HeaderValue::from(*limit));
            headers.insert("ratelimit-remaining", HeaderValue::from(0u32));
            headers.insert("ratelimit-reset", HeaderValue::from(*reset_after));
        }

        response.extensions_mut().insert(ErrorReport {
            status,
            message: self.to_string(),
            stack: format!("{}: {:?}", self.kind(), self),
        });
        response
    }
}
