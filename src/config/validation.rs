//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. Every problem is
//! reported, not just the first.

use std::net::SocketAddr;

use crate::config::schema::GateConfig;

/// Shortest accepted HMAC secret.
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest accepted credential lifetime. Browsers clamp cookie `Max-Age` to
/// 400 days.
pub const MAX_LIFETIME_SECS: u64 = 400 * 86_400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("session secret is required in production (set SITEGATE_SESSION_SECRET)")]
    MissingSecret,

    #[error("session secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },

    #[error("session.lifetime_secs must be greater than zero")]
    ZeroLifetime,

    #[error("session.lifetime_secs must be at most {max}, got {actual}")]
    LifetimeTooLong { max: u64, actual: u64 },

    #[error("session.max_session_age_secs ({ceiling}) is shorter than lifetime_secs ({lifetime})")]
    CeilingBelowLifetime { ceiling: u64, lifetime: u64 },

    #[error("session.cookie_name {0:?} is not a valid cookie name")]
    InvalidCookieName(String),

    #[error("contact_rate_limit.quota must be greater than zero")]
    ZeroQuota,

    #[error("contact_rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("contact_rate_limit.sweep_interval_secs must be greater than zero")]
    ZeroSweepInterval,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("{field} {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a fully loaded config (after environment overrides).
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let session = &config.session;

    match session.secret.as_deref() {
        None | Some("") if config.environment.is_production() => {
            errors.push(ValidationError::MissingSecret)
        }
        Some(secret) if !secret.is_empty() && secret.len() < MIN_SECRET_BYTES => {
            errors.push(ValidationError::WeakSecret {
                min: MIN_SECRET_BYTES,
                actual: secret.len(),
            })
        }
        _ => {}
    }

    if session.lifetime_secs == 0 {
        errors.push(ValidationError::ZeroLifetime);
    }
    if session.lifetime_secs > MAX_LIFETIME_SECS {
        errors.push(ValidationError::LifetimeTooLong {
            max: MAX_LIFETIME_SECS,
            actual: session.lifetime_secs,
        });
    }
    if let Some(ceiling) = session.max_session_age_secs.filter(|c| *c > 0) {
        if ceiling < session.lifetime_secs {
            errors.push(ValidationError::CeilingBelowLifetime {
                ceiling,
                lifetime: session.lifetime_secs,
            });
        }
    }
    if !is_cookie_token(&session.cookie_name) {
        errors.push(ValidationError::InvalidCookieName(session.cookie_name.clone()));
    }

    let limit = &config.contact_rate_limit;
    if limit.quota == 0 {
        errors.push(ValidationError::ZeroQuota);
    }
    if limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// RFC 6265 cookie-name token.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}
