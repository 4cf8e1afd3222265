//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cluster_proxy_requests_total` (counter): client requests by method, status
//! - `cluster_proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `cluster_proxy_worker_replies_total` (counter): worker replies by outcome
//!
//! Without an installed recorder (worker processes, tests) these are no-ops.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve Prometheus metrics on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished client request.
pub fn record_request(method: &str, status: &'static str, start: Instant) {
    counter!(
        "cluster_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("cluster_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a reply produced by a worker.
pub fn record_worker_reply(outcome: &'static str) {
    counter!("cluster_proxy_worker_replies_total", "outcome" => outcome).increment(1);
}
