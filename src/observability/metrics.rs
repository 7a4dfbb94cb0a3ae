//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_upstream_errors_total` (counter): transport failures by kind
//! - `proxy_rewrites_total` (counter): buffered rewrites by body kind
//! - `proxy_access_denied_total` (counter): gate rejections by reason
//! - `proxy_egress_refresh_total` (counter): egress-IP lookups by outcome
//!
//! Recording is a no-op until a recorder is installed, so the proxy core
//! and the tests can call these unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_rewrite(kind: &'static str) {
    counter!("proxy_rewrites_total", "kind" => kind).increment(1);
}

pub fn record_access_denied(reason: &'static str) {
    counter!("proxy_access_denied_total", "reason" => reason).increment(1);
}

pub fn record_egress_refresh(outcome: &'static str) {
    counter!("proxy_egress_refresh_total", "outcome" => outcome).increment(1);
}
