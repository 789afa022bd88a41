//! Upstream client capability.
//!
//! # Responsibilities
//! - Define the seam the relay dispatches through ([`UpstreamClient`])
//! - Model the upstream body as a one-shot, forward-only chunk stream
//! - Provide the production implementation on top of `reqwest`
//! - Bounded reads for error bodies and buffered relays

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamSettings;

/// Upstream body: finite, not restartable, consumed exactly once.
pub type ChunkStream = BoxStream<'static, Result<Bytes, UpstreamFailure>>;

/// Transport-level upstream failures. HTTP error statuses are not failures.
#[derive(Debug, Clone, Error)]
pub enum UpstreamFailure {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UpstreamFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// A fully prepared upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream status, with the body still unread.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: ChunkStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issues the POST to the upstream chat endpoint.
///
/// The returned future resolves once response headers are available.
pub trait UpstreamClient: Send + Sync + 'static {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamFailure>>;
}

/// Production client backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(settings.connect_timeout)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        // No total timeout here: it would cut long streams. The relay bounds
        // header wait, buffered reads and stream gaps itself.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl UpstreamClient for ReqwestUpstream {
    fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamFailure>> {
        async move {
            let response = self
                .client
                .post(request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await?;

            let status = response.status();
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(UpstreamFailure::from))
                .boxed();

            Ok(UpstreamResponse { status, body })
        }
        .boxed()
    }
}

/// Result of a bounded body read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBody {
    pub bytes: Bytes,
    /// The upstream had more than `limit` bytes; the rest was not read.
    pub truncated: bool,
}

/// Drain at most `limit` bytes from `body`, then drop it.
pub async fn read_bounded(mut body: ChunkStream, limit: usize) -> Result<BoundedBody, UpstreamFailure> {
    let mut buf = Vec::new();
    let mut truncated = false;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            truncated = true;
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(BoundedBody { bytes: Bytes::from(buf), truncated })
}
