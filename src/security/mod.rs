//! Abuse protection for public endpoints.
//!
//! # Data Flow
//! ```text
//! Incoming request on a limited route:
//!     → rate_limit.rs (client key → fixed-window check → headers or 429)
//!     → handler
//! ```

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RateLimitPolicy, RateLimitState};
