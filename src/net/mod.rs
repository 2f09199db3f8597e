//! Network layer.
//!
//! Plain TCP is served by `axum::serve`; TLS listeners go through
//! `axum-server` with the rustls material loaded here.

pub mod tls;
