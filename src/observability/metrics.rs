//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, strategy, status
//! - `gateway_request_duration_seconds` (histogram): latency by strategy
//! - `gateway_upstream_attempts_total` (counter): per-endpoint attempt outcomes
//! - `gateway_comparisons_total` (counter): dual dispatches by matched flag
//! - `gateway_comparison_log_failures_total` (counter): dropped log appends

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its scrape listener. A failed
/// install leaves metrics as no-ops rather than aborting startup.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, strategy: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "strategy" => strategy.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "strategy" => strategy.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_attempt(endpoint: &str, outcome: &str) {
    counter!(
        "gateway_upstream_attempts_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_comparison(strategy: &str, matched: bool) {
    counter!(
        "gateway_comparisons_total",
        "strategy" => strategy.to_string(),
        "matched" => matched.to_string()
    )
    .increment(1);
}

pub fn record_log_append_failure() {
    counter!("gateway_comparison_log_failures_total").increment(1);
}
