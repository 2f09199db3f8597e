//! Session authentication and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! access_token cookie
//!     → cookies.rs (read with the session cookie policy)
//!     → session.rs verify (codec.rs decode: structure, expiry, HMAC tag)
//!     → session.rs renew (new claims, new credential, same attributes)
//!     → Identity in request extensions
//!     → authorize.rs (admin role, or owner-or-admin via OwnershipResolver)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Verification is pure; renewal is an explicit second step
//! - Credentials are never mutated, only reissued
//! - Sliding expiry with an optional absolute ceiling from sign-in

pub mod authorize;
pub mod claims;
pub mod codec;
pub mod cookies;
pub mod middleware;
pub mod session;

pub use authorize::{InMemoryDirectory, OwnershipResolver, ResourceKind, Role};
pub use claims::{Identity, SessionClaims, SubjectId};
pub use codec::SessionSecret;
pub use middleware::{AuthState, CurrentUser, MaybeUser, OwnerGuard};
pub use session::{SessionGate, SessionSettings, VerifiedSession};
