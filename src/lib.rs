//! sitegate: request gates for a content site API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ net/http server (request id, trace, limits, error boundary)
//!         ├─▶ security::rate_limit ──▶ POST /api/contact
//!         └─▶ auth::middleware
//!               ├─ session gate (verify, renew, cookie)
//!               └─ authorization gate (admin, owner-or-admin)
//!                     ──▶ protected handlers
//!
//!     Cross-cutting: config (+ hot reload), observability, lifecycle, clock
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::GateConfig;
pub use error::GateError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
