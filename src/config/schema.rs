//! Configuration schema definitions.
//!
//! All sections default, so an empty file is a valid development config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Deployment environment; drives cookie attributes and error detail.
    pub environment: Environment,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Session credential and cookie settings.
    pub session: SessionConfig,

    /// Quota for the public contact endpoint.
    pub contact_rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment {:?}", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests in flight (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Session settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC signing secret. Prefer `SITEGATE_SESSION_SECRET` over the file.
    #[serde(skip_serializing)]
    pub secret: Option<String>,

    /// Cookie carrying the credential.
    pub cookie_name: String,

    /// Optional cookie domain.
    pub cookie_domain: Option<String>,

    /// Credential lifetime, renewed on every authenticated request.
    pub lifetime_secs: u64,

    /// Absolute ceiling from sign-in regardless of activity. `0` disables it.
    pub max_session_age_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            cookie_name: "access_token".to_string(),
            cookie_domain: None,
            lifetime_secs: 86_400,
            max_session_age_secs: Some(30 * 86_400),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("cookie_name", &self.cookie_name)
            .field("cookie_domain", &self.cookie_domain)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("max_session_age_secs", &self.max_session_age_secs)
            .finish()
    }
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Accepted requests per window per client.
    pub quota: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// How often stale entries are evicted.
    pub sweep_interval_secs: u64,

    /// Key clients on `X-Forwarded-For` (only behind a trusted proxy).
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quota: 5,
            window_secs: 3_600,
            sweep_interval_secs: 600,
            trust_forwarded_for: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format; defaults by environment.
    pub log_format: Option<LogFormat>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: GateConfig = toml::from_str("").unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.session.cookie_name, "access_token");
        assert_eq!(config.session.lifetime_secs, 86_400);
        assert_eq!(config.contact_rate_limit.quota, 5);
        assert_eq!(config.contact_rate_limit.window_secs, 3_600);
    }

    #[test]
    fn test_partial_sections() {
        let config: GateConfig = toml::from_str(
            r#"
            environment = "production"

            [session]
            cookie_domain = "example.com"
            max_session_age_secs = 0

            [contact_rate_limit]
            quota = 10
            "#,
        )
        .unwrap();

        assert!(config.environment.is_production());
        assert_eq!(config.session.cookie_domain.as_deref(), Some("example.com"));
        assert_eq!(config.session.max_session_age_secs, Some(0));
        assert_eq!(config.contact_rate_limit.quota, 10);
        assert_eq!(config.contact_rate_limit.window_secs, 3_600);
    }

    #[test]
    fn test_example_file_parses() {
        let config: GateConfig =
            toml::from_str(include_str!("../../sitegate.example.toml")).unwrap();
        assert_eq!(config.session.max_session_age_secs, Some(2_592_000));
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn test_secret_hidden_from_debug() {
        let session = SessionConfig {
            secret: Some("super-secret-value".into()),
            ..SessionConfig::default()
        };
        assert!(!format!("{:?}", session).contains("super-secret-value"));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }
}
