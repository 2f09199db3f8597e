//! Axum middleware and extractors for authenticated routes.
//!
//! Layering order on a route: `require_session` outermost, then
//! `require_admin` or `require_owner_or_admin`, then the handler.

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::authorize::{self, OwnershipResolver, ResourceKind, Role};
use crate::auth::claims::Identity;
use crate::auth::session::SessionGate;
use crate::clock::Clock;
use crate::error::GateError;
use crate::observability::metrics;

/// State for the session middlewares.
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionGate>,
    pub clock: Arc<dyn Clock>,
}

/// State for one owner-guarded resource family.
#[derive(Clone)]
pub struct OwnerGuard {
    pub resolver: Arc<dyn OwnershipResolver>,
    pub kind: ResourceKind,
}

/// Reject requests without a valid session; renew valid ones.
///
/// On success the caller's [`Identity`] is placed in the request extensions
/// and the response carries a renewed credential. A credential that fails
/// verification is cleared from the browser.
pub async fn require_session(
    State(auth): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = auth.sessions.current();
    let now = match auth.clock.now() {
        Ok(now) => now,
        Err(e) => return GateError::from(e).into_response(),
    };

    let presented = settings.cookie.credential(&jar);
    let had_credential = presented.is_some();

    let session = match settings.verify(presented, now) {
        Ok(session) => session,
        Err(err) => {
            metrics::record_auth_rejection(err.kind());
            tracing::debug!(reason = %err, path = %request.uri().path(), "Session rejected");
            if had_credential {
                return (jar.add(settings.cookie.removal_cookie()), err).into_response();
            }
            return err.into_response();
        }
    };

    let renewed = match settings.renew(&session, now) {
        Ok(credential) => credential,
        Err(err) => return (jar.add(settings.cookie.removal_cookie()), err).into_response(),
    };
    metrics::record_session_renewed();

    tracing::trace!(subject = %session.identity.subject_id, "Session verified");
    request.extensions_mut().insert(session.identity);

    let response = next.run(request).await;
    (jar.add(settings.cookie.session_cookie(renewed)), response).into_response()
}

/// Attach the caller's identity when a valid session is present; otherwise
/// continue anonymously. Broken credentials are still cleared.
pub async fn optional_session(
    State(auth): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = auth.sessions.current();
    let now = match auth.clock.now() {
        Ok(now) => now,
        Err(e) => return GateError::from(e).into_response(),
    };

    let verified = settings
        .verify(settings.cookie.credential(&jar), now)
        .and_then(|session| {
            let renewed = settings.renew(&session, now)?;
            Ok((session, renewed))
        });

    match verified {
        Ok((session, renewed)) => {
            metrics::record_session_renewed();
            request.extensions_mut().insert(session.identity);
            let response = next.run(request).await;
            (jar.add(settings.cookie.session_cookie(renewed)), response).into_response()
        }
        Err(GateError::Unauthenticated) => next.run(request).await,
        Err(err) => {
            tracing::debug!(reason = %err, "Ignoring unusable credential on optional route");
            let response = next.run(request).await;
            (jar.add(settings.cookie.removal_cookie()), response).into_response()
        }
    }
}

/// Admit only administrators. Must run inside `require_session`.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let decision = match request.extensions().get::<Identity>() {
        Some(identity) => authorize::require_role(identity, Role::Admin).inspect_err(|_| {
            tracing::warn!(subject = %identity.subject_id, "Admin route denied");
        }),
        None => Err(GateError::Unauthenticated),
    };

    match decision {
        Ok(()) => next.run(request).await,
        Err(err) => {
            if let GateError::Forbidden(reason) = &err {
                metrics::record_forbidden(reason.as_str());
            }
            err.into_response()
        }
    }
}

/// Admit the owner of the `{id}` resource or an administrator. Must run
/// inside `require_session`.
pub async fn require_owner_or_admin(
    State(guard): State<OwnerGuard>,
    Path(resource_id): Path<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(identity) = request.extensions().get::<Identity>().cloned() else {
        return GateError::Unauthenticated.into_response();
    };

    match authorize::authorize_owner(guard.resolver.as_ref(), &identity, guard.kind, &resource_id)
        .await
    {
        Ok(()) => next.run(request).await,
        Err(err) => {
            if let GateError::Forbidden(reason) = &err {
                metrics::record_forbidden(reason.as_str());
            }
            err.into_response()
        }
    }
}

/// Identity of an authenticated caller. Rejects with 401 when the route is
/// not behind `require_session`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(GateError::Unauthenticated)
    }
}

/// Identity of the caller if one was attached.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Identity>().cloned()))
    }
}
