//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by outcome, status
//! - `relay_request_duration_seconds` (histogram): latency by outcome
//! - `relay_stream_chunks_total` (counter): chunks forwarded to clients
//! - `relay_stream_bytes_total` (counter): streamed bytes forwarded
//!
//! # Design Decisions
//! - Exporter is opt-in (`observability.metrics_enabled`)
//! - Labels are low-cardinality: outcome label values are fixed strings

use axum::http::StatusCode;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(outcome: &'static str, status: StatusCode, started: Instant) {
    counter!(
        "relay_requests_total",
        "outcome" => outcome,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

/// Record one chunk forwarded on a streaming response.
pub fn record_stream_chunk(bytes: usize) {
    counter!("relay_stream_chunks_total").increment(1);
    counter!("relay_stream_bytes_total").increment(bytes as u64);
}
