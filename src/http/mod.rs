//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (layers: request id, trace, concurrency, timeout, body limit)
//!     → response.rs error boundary
//!     → routes.rs (route → gate middleware → handler)
//!     → contact.rs for the public form
//! ```

pub mod contact;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use contact::{ContactForm, ContactSink, LoggingContactSink, SinkError};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, Dependencies, HttpServer};
