//! Gate metrics.
//!
//! # Metrics
//! - `sitegate_auth_rejections_total{kind}` (counter): sessions refused
//! - `sitegate_sessions_renewed_total` (counter): credentials reissued
//! - `sitegate_forbidden_total{reason}` (counter): authorization denials
//! - `sitegate_rate_limited_total{route}` (counter): requests over quota
//! - `sitegate_rate_limit_clients` (gauge): entries in the limiter table
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_auth_rejection(kind: &'static str) {
    counter!("sitegate_auth_rejections_total", "kind" => kind).increment(1);
}

pub fn record_session_renewed() {
    counter!("sitegate_sessions_renewed_total").increment(1);
}

pub fn record_forbidden(reason: &'static str) {
    counter!("sitegate_forbidden_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(route: &'static str) {
    counter!("sitegate_rate_limited_total", "route" => route).increment(1);
}

pub fn record_rate_limit_clients(count: usize) {
    gauge!("sitegate_rate_limit_clients").set(count as f64);
}
