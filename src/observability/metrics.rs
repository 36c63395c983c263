//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): responses by status code
//! - `gate_request_duration_seconds` (histogram): end-to-end latency
//! - `gate_decisions_total` (counter): routing decisions by kind and path class
//! - `gate_cache_lookups_total` (counter): decision cache hits and misses
//! - `gate_token_failures_total` (counter): verification failures by reason
//! - `gate_upstream_errors_total` (counter): forwarding failures by kind
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gate_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gate_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_decision(decision: &'static str, classification: &'static str) {
    counter!(
        "gate_decisions_total",
        "decision" => decision,
        "classification" => classification
    )
    .increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gate_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_token_failure(reason: &'static str) {
    counter!("gate_token_failures_total", "reason" => reason).increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("gate_upstream_errors_total", "kind" => kind).increment(1);
}
