//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gates and server produce:
//!     → logging.rs (structured tracing events, JSON in production)
//!     → metrics.rs (rejection / renewal / rate-limit counters)
//!
//! Consumers:
//!     → stdout log shipping
//!     → Prometheus scrape of the metrics listener
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the trace layer span
//! - Credentials and secrets are never logged

pub mod logging;
pub mod metrics;
