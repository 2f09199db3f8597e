//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::auth::SessionSecret;
use crate::config::schema::{Environment, GateConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `session.secret`.
pub const SECRET_ENV: &str = "SITEGATE_SESSION_SECRET";
/// Overrides `environment`.
pub const ENVIRONMENT_ENV: &str = "SITEGATE_ENV";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {var}: {reason}")]
    Environment { var: &'static str, reason: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |var| std::env::var(var).ok())
}

/// Parse TOML, apply overrides from `lookup`, validate.
pub fn parse_config<F>(content: &str, lookup: F) -> Result<GateConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: GateConfig = toml::from_str(content)?;
    apply_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_overrides<F>(config: &mut GateConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENVIRONMENT_ENV) {
        config.environment = raw.parse().map_err(|reason| ConfigError::Environment {
            var: ENVIRONMENT_ENV,
            reason,
        })?;
    }
    if let Some(secret) = lookup(SECRET_ENV).filter(|s| !s.is_empty()) {
        config.session.secret = Some(secret);
    }
    Ok(())
}

/// Signing secret for a validated config.
///
/// Outside production a missing secret is replaced by a random one, which
/// invalidates every session on restart.
pub fn resolve_secret(config: &GateConfig) -> Result<SessionSecret, ConfigError> {
    match config.session.secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => Ok(SessionSecret::new(secret.as_bytes())),
        None if config.environment == Environment::Production => {
            Err(ConfigError::Validation(vec![ValidationError::MissingSecret]))
        }
        None => {
            tracing::warn!(
                environment = %config.environment,
                "No session secret configured; using a random one. Sessions will not survive a restart"
            );
            Ok(SessionSecret::generate())
        }
    }
}
