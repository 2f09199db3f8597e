//! Route table.
//!
//! Handlers are thin: sign-in, content storage and mail delivery live
//! elsewhere. What matters here is which gate guards which route.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::middleware::{optional_session, require_admin, require_owner_or_admin, require_session};
use crate::auth::{AuthState, CurrentUser, Identity, MaybeUser, OwnerGuard, ResourceKind, SessionGate};
use crate::error::GateError;
use crate::http::contact::submit_contact;
use crate::http::server::AppState;
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState};

pub fn api_router(state: &AppState) -> Router {
    let auth = AuthState {
        sessions: state.sessions.clone(),
        clock: state.clock.clone(),
    };

    Router::new()
        .nest("/api/auth", auth_routes(state, &auth))
        .merge(contact_routes(state))
        .nest("/api/posts", resource_routes(ResourceKind::Post, state, &auth))
        .nest("/api/services", resource_routes(ResourceKind::Service, state, &auth))
        .nest("/api/courses", resource_routes(ResourceKind::Course, state, &auth))
        .nest("/api/admin", admin_routes(state, &auth))
}

fn auth_routes(state: &AppState, auth: &AuthState) -> Router {
    let me_route = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(auth.clone(), require_session));

    let status_route = Router::new()
        .route("/status", get(session_status))
        .route_layer(middleware::from_fn_with_state(auth.clone(), optional_session));

    let signout_route = Router::new()
        .route("/signout", post(signout))
        .with_state(state.sessions.clone());

    me_route.merge(status_route).merge(signout_route)
}

fn contact_routes(state: &AppState) -> Router {
    let limit = RateLimitState {
        limiter: state.limiter.clone(),
        clock: state.clock.clone(),
        trust_forwarded_for: state.trust_forwarded_for,
        route: "contact",
    };

    Router::new()
        .route("/api/contact", post(submit_contact))
        .route_layer(middleware::from_fn_with_state(limit, rate_limit_middleware))
        .with_state(state.contacts.clone())
}

fn resource_routes(kind: ResourceKind, state: &AppState, auth: &AuthState) -> Router {
    let guard = OwnerGuard {
        resolver: state.resolver.clone(),
        kind,
    };

    Router::new()
        .route("/{id}", put(update_resource).delete(delete_resource))
        .route_layer(middleware::from_fn_with_state(guard, require_owner_or_admin))
        .route_layer(middleware::from_fn_with_state(auth.clone(), require_session))
        .with_state(kind)
}

fn admin_routes(state: &AppState, auth: &AuthState) -> Router {
    Router::new()
        .route("/overview", get(admin_overview))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(auth.clone(), require_session))
        .with_state(state.clone())
}

#[derive(Debug, Serialize)]
struct UserResponse {
    success: bool,
    user: Identity,
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    success: bool,
    authenticated: bool,
    user: Option<Identity>,
}

async fn session_status(MaybeUser(user): MaybeUser) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        authenticated: user.is_some(),
        user,
    })
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

/// Always clears the cookie, signed in or not.
async fn signout(
    State(sessions): State<Arc<SessionGate>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let settings = sessions.current();
    (
        jar.add(settings.cookie.removal_cookie()),
        Json(MessageResponse {
            success: true,
            message: "Signed out successfully".to_string(),
        }),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceResponse {
    success: bool,
    message: String,
    id: String,
    acted_by: String,
}

async fn update_resource(
    State(kind): State<ResourceKind>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ResourceResponse>, GateError> {
    let Json(changes) = payload.map_err(GateError::from)?;
    if !changes.is_object() {
        return Err(GateError::BadRequest("expected a JSON object".into()));
    }

    tracing::info!(subject = %user.subject_id, resource = %kind, resource_id = %id, "Resource update accepted");
    Ok(Json(ResourceResponse {
        success: true,
        message: format!("{kind} updated"),
        id,
        acted_by: user.subject_id.to_string(),
    }))
}

async fn delete_resource(
    State(kind): State<ResourceKind>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Json<ResourceResponse> {
    tracing::info!(subject = %user.subject_id, resource = %kind, resource_id = %id, "Resource delete accepted");
    Json(ResourceResponse {
        success: true,
        message: format!("{kind} deleted"),
        id,
        acted_by: user.subject_id.to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Overview {
    success: bool,
    version: &'static str,
    environment: String,
    session_lifetime_secs: u64,
    max_session_age_secs: Option<u64>,
    contact_quota: u32,
    contact_window_secs: u64,
    rate_limited_clients: usize,
}

async fn admin_overview(State(state): State<AppState>) -> Json<Overview> {
    let session = state.sessions.current();
    let policy = state.limiter.policy();
    Json(Overview {
        success: true,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.environment.to_string(),
        session_lifetime_secs: session.lifetime_secs,
        max_session_age_secs: session.max_session_age_secs,
        contact_quota: policy.quota,
        contact_window_secs: policy.window_secs,
        rate_limited_clients: state.limiter.tracked_clients(),
    })
}
