//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): forwarded requests by method, status
//! - `edge_request_duration_seconds` (histogram): end-to-end latency
//! - `edge_rate_limited_total` (counter): 429s by category
//! - `edge_resolutions_total` (counter): tenant resolution outcomes
//! - `edge_gate_denials_total` (counter): access gate denials by feature, action
//! - `edge_auth_redirects_total` (counter): session-guard redirects
//!
//! # Design Decisions
//! - Low-overhead updates (atomic counters via the `metrics` macros)
//! - Prometheus exposition on a separate scrape address

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("edge_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(category: &'static str) {
    metrics::counter!("edge_rate_limited_total", "category" => category).increment(1);
}

pub fn record_resolution(action: &'static str) {
    metrics::counter!("edge_resolutions_total", "action" => action).increment(1);
}

pub fn record_gate_denial(feature: &str, action: &'static str) {
    metrics::counter!(
        "edge_gate_denials_total",
        "feature" => feature.to_string(),
        "action" => action,
    )
    .increment(1);
}

pub fn record_auth_redirect() {
    metrics::counter!("edge_auth_redirects_total").increment(1);
}
