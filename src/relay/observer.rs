//! Relay event reporting.
//!
//! The relay never logs directly; it reports [`RelayEvent`]s to an injected
//! [`RelayObserver`]. [`TracingObserver`] is the production implementation and
//! turns events into leveled `tracing` records and metrics.

use axum::http::{HeaderMap, Method, StatusCode};
use std::time::Instant;
use url::Url;

use crate::http::request::request_id;
use crate::observability::metrics;
use crate::relay::error::RelayError;

/// Per-request data carried alongside every event.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub started: Instant,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: request_id(headers),
            started: Instant::now(),
        }
    }
}

/// Chunk and byte totals of a relayed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: u64,
    pub bytes: u64,
}

impl StreamStats {
    pub fn record(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len as u64;
    }
}

/// How a relayed stream ended.
#[derive(Debug, Clone)]
pub enum StreamEnd {
    /// Upstream signalled end-of-stream.
    Finished,
    /// The client body was dropped; upstream read cancelled.
    ClientGone,
    /// Upstream produced no chunk within the idle timeout.
    IdleTimeout,
    /// Upstream transport failed mid-stream.
    UpstreamFailed(String),
}

impl StreamEnd {
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Finished => "stream_ok",
            Self::ClientGone => RelayError::StreamAborted.outcome(),
            Self::IdleTimeout => "stream_timeout",
            Self::UpstreamFailed(_) => "stream_failed",
        }
    }
}

/// Something that happened while relaying one request.
#[derive(Debug)]
pub enum RelayEvent<'a> {
    Preflight,
    Dispatched { method: &'a Method, url: &'a Url, streaming: bool, body_bytes: usize },
    Relayed { status: StatusCode, body_bytes: usize },
    Failed { error: &'a RelayError },
    StreamStarted,
    StreamChunk { bytes: usize },
    StreamEnded { end: &'a StreamEnd, stats: StreamStats },
}

/// Receives relay events. Implementations must be cheap; they run inline.
pub trait RelayObserver: Send + Sync + 'static {
    fn on_event(&self, ctx: &RequestContext, event: RelayEvent<'_>);
}

/// Logs through `tracing` and records Prometheus metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn on_event(&self, ctx: &RequestContext, event: RelayEvent<'_>) {
        let request_id = ctx.request_id.as_str();
        match event {
            RelayEvent::Preflight => {
                tracing::debug!(request_id = %request_id, "CORS preflight answered");
                metrics::record_request("preflight", StatusCode::NO_CONTENT, ctx.started);
            }
            RelayEvent::Dispatched { method, url, streaming, body_bytes } => {
                tracing::debug!(
                    request_id = %request_id,
                    method = %method,
                    upstream = %url,
                    streaming,
                    body_bytes,
                    "Dispatching to upstream"
                );
            }
            RelayEvent::Relayed { status, body_bytes } => {
                tracing::info!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    body_bytes,
                    elapsed_ms = ctx.started.elapsed().as_millis() as u64,
                    "Relayed upstream response"
                );
                metrics::record_request("ok", status, ctx.started);
            }
            RelayEvent::Failed { error } => {
                let status = error.status();
                match error {
                    RelayError::Configuration { credential } => tracing::error!(
                        request_id = %request_id,
                        outcome = error.outcome(),
                        credential = %credential,
                        "Upstream credential not configured"
                    ),
                    RelayError::Internal { details } => tracing::error!(
                        request_id = %request_id,
                        outcome = error.outcome(),
                        details = %details,
                        "Internal relay error"
                    ),
                    RelayError::Upstream { details, .. } => tracing::warn!(
                        request_id = %request_id,
                        outcome = error.outcome(),
                        status = status.as_u16(),
                        details = %details,
                        "Upstream returned an error"
                    ),
                    RelayError::MethodNotAllowed
                    | RelayError::InvalidRequestBody { .. }
                    | RelayError::RequestBody { .. }
                    | RelayError::PayloadTooLarge { .. } => tracing::debug!(
                        request_id = %request_id,
                        outcome = error.outcome(),
                        error = %error,
                        "Request rejected"
                    ),
                    _ => tracing::warn!(
                        request_id = %request_id,
                        outcome = error.outcome(),
                        status = status.as_u16(),
                        error = %error,
                        "Relay failed"
                    ),
                }
                metrics::record_request(error.outcome(), status, ctx.started);
            }
            RelayEvent::StreamStarted => {
                tracing::debug!(request_id = %request_id, "Streaming upstream response");
            }
            RelayEvent::StreamChunk { bytes } => {
                tracing::trace!(request_id = %request_id, bytes, "Relayed chunk");
                metrics::record_stream_chunk(bytes);
            }
            RelayEvent::StreamEnded { end, stats } => {
                match end {
                    StreamEnd::Finished => tracing::info!(
                        request_id = %request_id,
                        chunks = stats.chunks,
                        bytes = stats.bytes,
                        elapsed_ms = ctx.started.elapsed().as_millis() as u64,
                        "Stream relayed"
                    ),
                    StreamEnd::ClientGone => tracing::info!(
                        request_id = %request_id,
                        chunks = stats.chunks,
                        bytes = stats.bytes,
                        "Client disconnected, upstream stream cancelled"
                    ),
                    StreamEnd::IdleTimeout => tracing::warn!(
                        request_id = %request_id,
                        chunks = stats.chunks,
                        "Upstream stream idle timeout"
                    ),
                    StreamEnd::UpstreamFailed(e) => tracing::warn!(
                        request_id = %request_id,
                        chunks = stats.chunks,
                        error = %e,
                        "Upstream stream failed"
                    ),
                }
                metrics::record_request(end.outcome(), StatusCode::OK, ctx.started);
            }
        }
    }
}
