//! Session verification and renewal.
//!
//! `verify` is pure: it never touches the outbound cookie. `renew` is the
//! explicit second step that mints the next credential of a sliding session.
//! The middleware in `auth::middleware` composes the two.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::auth::claims::{Identity, SessionClaims};
use crate::auth::codec::{self, SessionSecret};
use crate::auth::cookies::CookiePolicy;
use crate::clock::UnixSeconds;
use crate::config::{Environment, SessionConfig};
use crate::error::GateError;

/// A credential that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub identity: Identity,
    pub claims: SessionClaims,
}

/// Everything needed to verify and mint credentials.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub secret: SessionSecret,
    pub lifetime_secs: u64,
    /// Absolute session ceiling measured from sign-in. `None` means pure
    /// sliding expiry.
    pub max_session_age_secs: Option<u64>,
    pub cookie: CookiePolicy,
}

impl SessionSettings {
    pub fn new(config: &SessionConfig, environment: Environment, secret: SessionSecret) -> Self {
        Self {
            secret,
            lifetime_secs: config.lifetime_secs,
            max_session_age_secs: config.max_session_age_secs.filter(|s| *s > 0),
            cookie: CookiePolicy::for_environment(
                environment,
                &config.cookie_name,
                config.lifetime_secs,
                config.cookie_domain.clone(),
            ),
        }
    }

    /// Mint the credential for a fresh sign-in.
    pub fn issue(&self, identity: &Identity, now: UnixSeconds) -> Result<String, GateError> {
        let claims = SessionClaims::issue(identity, now, self.lifetime_secs);
        Ok(codec::encode(&claims, &self.secret)?)
    }

    /// Check a presented credential. Absence is `Unauthenticated`.
    pub fn verify(
        &self,
        credential: Option<&str>,
        now: UnixSeconds,
    ) -> Result<VerifiedSession, GateError> {
        let credential = credential.ok_or(GateError::Unauthenticated)?;
        let claims = codec::decode(credential, &self.secret, now)?;

        if let Some(hard_stop) = claims.absolute_expiry(self.max_session_age_secs) {
            if now >= hard_stop {
                return Err(GateError::SessionExpired);
            }
        }

        Ok(VerifiedSession {
            identity: claims.identity(),
            claims,
        })
    }

    /// Mint the next credential for a verified session.
    pub fn renew(&self, session: &VerifiedSession, now: UnixSeconds) -> Result<String, GateError> {
        let next = session
            .claims
            .renewed(now, self.lifetime_secs, self.max_session_age_secs)
            .ok_or(GateError::SessionExpired)?;
        Ok(codec::encode(&next, &self.secret)?)
    }
}

/// Shared session authority. Settings can be replaced at runtime.
pub struct SessionGate {
    settings: ArcSwap<SessionSettings>,
}

impl SessionGate {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings: ArcSwap::from_pointee(settings),
        }
    }

    /// Snapshot of the current settings. Use one snapshot per request.
    pub fn current(&self) -> Arc<SessionSettings> {
        self.settings.load_full()
    }

    /// Replace the settings. Rotating the secret invalidates every
    /// outstanding credential.
    pub fn reconfigure(&self, settings: SessionSettings) {
        let rotated = self.settings.load().secret != settings.secret;
        self.settings.store(Arc::new(settings));
        if rotated {
            tracing::warn!("Session secret rotated; existing sessions are no longer valid");
        } else {
            tracing::info!("Session settings reloaded");
        }
    }

    pub fn issue(&self, identity: &Identity, now: UnixSeconds) -> Result<String, GateError> {
        self.settings.load().issue(identity, now)
    }

    pub fn verify(
        &self,
        credential: Option<&str>,
        now: UnixSeconds,
    ) -> Result<VerifiedSession, GateError> {
        self.settings.load().verify(credential, now)
    }

    pub fn renew(&self, session: &VerifiedSession, now: UnixSeconds) -> Result<String, GateError> {
        self.settings.load().renew(session, now)
    }
}
