//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_collapsed_requests_total` (counter): callers that joined an in-flight operation
//! - `broker_published_total` (counter): request artifacts by outcome
//! - `broker_discovered_total` (counter): response artifacts by outcome
//! - `broker_swept_files_total` (counter): artifacts removed by the TTL sweep
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics::{counter, histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
    ];
    counter!("proxy_requests_total", labels.clone()).increment(1);
    histogram!("proxy_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

pub fn record_collapsed() {
    counter!("proxy_collapsed_requests_total").increment(1);
}

/// `outcome` is one of `written`, `exists`, `failed`, `rejected`.
pub fn record_published(outcome: &'static str) {
    counter!("broker_published_total", "outcome" => outcome).increment(1);
}

/// `outcome` is one of `delivered`, `missing`, `failed`.
pub fn record_discovered(outcome: &'static str) {
    counter!("broker_discovered_total", "outcome" => outcome).increment(1);
}

pub fn record_swept(count: usize) {
    counter!("broker_swept_files_total").increment(count as u64);
}
