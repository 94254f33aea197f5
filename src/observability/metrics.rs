//! Metrics collection and exposition.
//!
//! # Metrics
//! - `routegate_requests_total` (counter): terminal responses by method, status, stage
//! - `routegate_request_duration_seconds` (histogram): latency by method, stage
//! - `routegate_proxy_attempts_total` (counter): forwarding attempts by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter serves its own scrape endpoint

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

pub mod names {
    pub const REQUESTS_TOTAL: &str = "routegate_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "routegate_request_duration_seconds";
    pub const PROXY_ATTEMPTS_TOTAL: &str = "routegate_proxy_attempts_total";
}

/// Start the Prometheus exporter on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus exporter");
            false
        }
    }
}

/// Record a terminal response produced by the dispatcher.
pub fn record_request(method: &str, status: u16, stage: &'static str, start: Instant) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "stage" => stage
    )
    .increment(1);

    histogram!(
        names::REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "stage" => stage
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one forwarding attempt (`success`, `timeout` or `failure`).
pub fn record_proxy_attempt(outcome: &'static str) {
    counter!(names::PROXY_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}
