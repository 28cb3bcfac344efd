//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, status, mode
//! - `relay_request_duration_seconds` (histogram): time to response head, by mode
//! - `relay_stream_chunks_total` (counter): chunks relayed to callers
//! - `relay_stream_duration_seconds` (histogram): full relay lifetime, by outcome
//! - `relay_upstream_errors_total` (counter): transport failures, by mode

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, mode: &'static str, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "mode" => mode,
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_stream_chunk() {
    counter!("relay_stream_chunks_total").increment(1);
}

pub fn record_stream_end(outcome: &'static str, start: Instant) {
    histogram!("relay_stream_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(mode: &'static str) {
    counter!("relay_upstream_errors_total", "mode" => mode).increment(1);
}
