//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! sitegate.toml
//!     → loader.rs (parse, SITEGATE_* overrides)
//!     → validation.rs (semantic checks, all errors reported)
//!     → GateConfig
//!
//! On file change:
//!     watcher.rs reloads and validates
//!     → server swaps session settings and rate-limit policy
//!     → listener, TLS and timeouts need a restart
//! ```

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, resolve_secret, ConfigError};
pub use schema::{
    Environment, GateConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    SecurityConfig, SessionConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
