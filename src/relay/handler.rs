//! The relay handler.
//!
//! # Request State Machine
//! ```text
//! START ─ OPTIONS ──────────────▶ PREFLIGHT_DONE
//!       ─ method ≠ POST ────────▶ REJECTED (405)
//!       ─ no credential ────────▶ MISCONFIGURED (500)
//!       ─ POST ─▶ DISPATCHED ─ non-2xx ─────────────▶ UPSTREAM_ERROR (upstream status)
//!                            ─ 2xx buffered ─▶ PARSING ─▶ DONE | PARSE_FAILED (500)
//!                            ─ 2xx streaming ─▶ STREAMING ─▶ DONE
//! any step ─▶ INTERNAL_ERROR (500)
//! ```

use axum::body::Body;
use axum::http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, Uri, Version};
use axum::response::IntoResponse;
use http_body_util::LengthLimitError;
use serde::de::IgnoredAny;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ApiKey, LimitsConfig, RelayConfig, UpstreamSettings};
use crate::http::cors;
use crate::http::response::json_bytes_response;
use crate::relay::error::RelayError;
use crate::relay::observer::{RelayEvent, RelayObserver, RequestContext};
use crate::relay::stream::spawn_relay;
use crate::relay::upstream::{read_bounded, UpstreamClient, UpstreamRequest, UpstreamResponse};

const EVENT_STREAM: &str = "text/event-stream";
const APPLICATION_JSON: &str = "application/json";

/// Per-endpoint relay behaviour.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    pub validate_json_body: bool,
    pub limits: LimitsConfig,
}

impl RelayOptions {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            validate_json_body: config.relay.validate_json_body,
            limits: config.limits.clone(),
        }
    }
}

/// How the upstream body is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Buffered,
    Streaming,
}

impl RelayMode {
    /// Streaming when the caller accepts `text/event-stream` or passes `?stream=true`.
    pub fn detect(headers: &HeaderMap, uri: &Uri) -> Self {
        let accepts_events = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains(EVENT_STREAM));

        let flagged = uri
            .query()
            .map(|q| {
                q.split('&').any(|pair| match pair.split_once('=') {
                    Some(("stream", value)) => matches!(value, "true" | "1" | "yes"),
                    _ => false,
                })
            })
            .unwrap_or(false);

        if accepts_events || flagged {
            Self::Streaming
        } else {
            Self::Buffered
        }
    }
}

/// Stateless per-request relay to the upstream chat endpoint.
pub struct RelayHandler {
    settings: UpstreamSettings,
    options: RelayOptions,
    client: Arc<dyn UpstreamClient>,
    observer: Arc<dyn RelayObserver>,
}

impl RelayHandler {
    pub fn new(
        settings: UpstreamSettings,
        options: RelayOptions,
        client: Arc<dyn UpstreamClient>,
        observer: Arc<dyn RelayObserver>,
    ) -> Self {
        Self { settings, options, client, observer }
    }

    pub fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }

    /// Relay one inbound request. Never fails: errors become JSON responses.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let ctx = RequestContext::from_headers(request.headers());
        match self.relay(&ctx, request).await {
            Ok(response) => response,
            Err(error) => {
                let error = error.redacted(self.settings.api_key.as_ref());
                self.observer.on_event(&ctx, RelayEvent::Failed { error: &error });
                error.into_response()
            }
        }
    }

    async fn relay(&self, ctx: &RequestContext, request: Request<Body>) -> Result<Response<Body>, RelayError> {
        let method = request.method().clone();
        if method == Method::OPTIONS {
            self.observer.on_event(ctx, RelayEvent::Preflight);
            return Ok(cors::preflight_response());
        }
        if method != Method::POST {
            return Err(RelayError::MethodNotAllowed);
        }

        let api_key = self.settings.api_key.as_ref().ok_or_else(|| RelayError::Configuration {
            credential: self.settings.credential_name.clone(),
        })?;

        let mode = RelayMode::detect(request.headers(), request.uri());
        let version = request.version();
        let upstream_request = self.prepare(api_key, mode, request).await?;

        self.observer.on_event(
            ctx,
            RelayEvent::Dispatched {
                method: &method,
                url: &upstream_request.url,
                streaming: mode == RelayMode::Streaming,
                body_bytes: upstream_request.body.len(),
            },
        );

        let response = tokio::time::timeout(self.settings.response_timeout, self.client.send(upstream_request))
            .await
            .map_err(|_| timeout_error("no upstream response", self.settings.response_timeout))??;

        if !response.status.is_success() {
            return Err(self.upstream_error(response).await);
        }

        match mode {
            RelayMode::Buffered => self.relay_buffered(ctx, response).await,
            RelayMode::Streaming => Ok(self.relay_streaming(ctx, response, version)),
        }
    }

    /// Build the upstream call. The body bytes are forwarded untouched.
    async fn prepare(
        &self,
        api_key: &ApiKey,
        mode: RelayMode,
        request: Request<Body>,
    ) -> Result<UpstreamRequest, RelayError> {
        let (parts, body) = request.into_parts();

        let limit = self.options.limits.max_body_bytes;
        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            if is_length_limit(&e) {
                RelayError::PayloadTooLarge { limit }
            } else {
                RelayError::RequestBody { details: e.to_string() }
            }
        })?;

        if self.options.validate_json_body {
            serde_json::from_slice::<IgnoredAny>(&body)
                .map_err(|e| RelayError::InvalidRequestBody { details: e.to_string() })?;
        }

        let mut headers = HeaderMap::new();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(CONTENT_TYPE, content_type);

        let mut authorization = HeaderValue::from_str(&api_key.bearer()).map_err(|_| {
            RelayError::internal(format!(
                "{} contains characters not allowed in a header",
                self.settings.credential_name
            ))
        })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        if mode == RelayMode::Streaming {
            headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        }

        Ok(UpstreamRequest {
            url: self.settings.chat_url.clone(),
            headers,
            body,
        })
    }

    async fn upstream_error(&self, response: UpstreamResponse) -> RelayError {
        let status = response.status;
        let read = tokio::time::timeout(
            self.settings.response_timeout,
            read_bounded(response.body, self.options.limits.max_error_body_bytes),
        )
        .await;

        let details = match read {
            Ok(Ok(body)) => String::from_utf8_lossy(&body.bytes).into_owned(),
            Ok(Err(failure)) => failure.to_string(),
            Err(_) => "timed out reading upstream error body".to_string(),
        };
        RelayError::Upstream { status, details }
    }

    async fn relay_buffered(
        &self,
        ctx: &RequestContext,
        response: UpstreamResponse,
    ) -> Result<Response<Body>, RelayError> {
        let status = response.status;
        let limit = self.options.limits.max_response_bytes;

        let body = tokio::time::timeout(self.settings.response_timeout, read_bounded(response.body, limit))
            .await
            .map_err(|_| timeout_error("upstream body incomplete", self.settings.response_timeout))??;

        if body.truncated {
            return Err(RelayError::UpstreamTooLarge { limit });
        }

        if serde_json::from_slice::<IgnoredAny>(&body.bytes).is_err() {
            return Err(RelayError::invalid_payload(&String::from_utf8_lossy(&body.bytes)));
        }

        self.observer.on_event(ctx, RelayEvent::Relayed { status, body_bytes: body.bytes.len() });
        Ok(json_bytes_response(status, body.bytes))
    }

    fn relay_streaming(&self, ctx: &RequestContext, response: UpstreamResponse, version: Version) -> Response<Body> {
        let body = spawn_relay(
            response.body,
            self.settings.stream_idle_timeout,
            self.observer.clone(),
            ctx.clone(),
        );

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        // Connection-specific headers are forbidden in HTTP/2 and later.
        if version < Version::HTTP_2 {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }
        cors::apply_cors(headers);
        response
    }
}

/// Whether a body read failed on a size cap, ours or `RequestBodyLimitLayer`'s.
fn is_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn timeout_error(what: &str, after: Duration) -> RelayError {
    RelayError::UpstreamTimeout {
        details: format!("{} within {}s", what, after.as_secs()),
    }
}
