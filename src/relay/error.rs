//! Relay error taxonomy and its JSON rendering.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ApiKey;
use crate::http::response::json_response;
use crate::relay::upstream::UpstreamFailure;

/// Characters of a malformed upstream body echoed back in `raw`.
pub const RAW_PREVIEW_CHARS: usize = 200;

/// Every way a relay request can end other than success or preflight.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{credential} not configured")]
    Configuration { credential: String },

    #[error("Upstream API error")]
    Upstream { status: StatusCode, details: String },

    #[error("Invalid JSON response")]
    InvalidUpstreamPayload { raw: String },

    /// The client went away mid-stream. Reported, never rendered.
    #[error("Client disconnected mid-stream")]
    StreamAborted,

    #[error("Invalid JSON body")]
    InvalidRequestBody { details: String },

    #[error("Failed to read request body")]
    RequestBody { details: String },

    #[error("Payload too large")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to reach upstream")]
    UpstreamUnreachable { details: String },

    #[error("Upstream timeout")]
    UpstreamTimeout { details: String },

    #[error("Upstream response too large")]
    UpstreamTooLarge { limit: usize },

    #[error("Internal Server Error")]
    Internal { details: String },
}

impl RelayError {
    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal { details: details.into() }
    }

    /// Build an `InvalidUpstreamPayload` from the raw upstream text.
    pub fn invalid_payload(text: &str) -> Self {
        Self::InvalidUpstreamPayload { raw: preview(text, RAW_PREVIEW_CHARS) }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Configuration { .. }
            | Self::InvalidUpstreamPayload { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
            // Never sent; the client is gone.
            Self::StreamAborted => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody { .. } | Self::RequestBody { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamUnreachable { .. } | Self::UpstreamTooLarge { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Short label used for log fields and metric labels.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "rejected",
            Self::Configuration { .. } => "misconfigured",
            Self::Upstream { .. } => "upstream_error",
            Self::InvalidUpstreamPayload { .. } => "invalid_payload",
            Self::StreamAborted => "stream_aborted",
            Self::InvalidRequestBody { .. } | Self::RequestBody { .. } => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::UpstreamUnreachable { .. } => "unreachable",
            Self::UpstreamTimeout { .. } => "timeout",
            Self::UpstreamTooLarge { .. } => "too_large",
            Self::Internal { .. } => "internal",
        }
    }

    /// JSON body sent to the caller.
    pub fn body(&self) -> Value {
        let error = self.to_string();
        match self {
            Self::Upstream { status, details } => json!({
                "error": error,
                "status": status.as_u16(),
                "details": details,
            }),
            Self::InvalidUpstreamPayload { raw } => json!({ "error": error, "raw": raw }),
            Self::UpstreamTooLarge { limit } | Self::PayloadTooLarge { limit } => {
                json!({ "error": error, "limit": limit })
            }
            Self::InvalidRequestBody { details }
            | Self::RequestBody { details }
            | Self::UpstreamUnreachable { details }
            | Self::UpstreamTimeout { details }
            | Self::Internal { details } => json!({ "error": error, "details": details }),
            Self::MethodNotAllowed | Self::Configuration { .. } | Self::StreamAborted => {
                json!({ "error": error })
            }
        }
    }

    /// Strip the credential from every caller-visible string.
    pub fn redacted(self, key: Option<&ApiKey>) -> Self {
        let Some(key) = key else {
            return self;
        };
        match self {
            Self::Upstream { status, details } => Self::Upstream { status, details: key.redact(&details) },
            Self::InvalidUpstreamPayload { raw } => Self::InvalidUpstreamPayload { raw: key.redact(&raw) },
            Self::InvalidRequestBody { details } => Self::InvalidRequestBody { details: key.redact(&details) },
            Self::RequestBody { details } => Self::RequestBody { details: key.redact(&details) },
            Self::UpstreamUnreachable { details } => Self::UpstreamUnreachable { details: key.redact(&details) },
            Self::UpstreamTimeout { details } => Self::UpstreamTimeout { details: key.redact(&details) },
            Self::Internal { details } => Self::Internal { details: key.redact(&details) },
            other => other,
        }
    }
}

impl From<UpstreamFailure> for RelayError {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Timeout(details) => Self::UpstreamTimeout { details },
            UpstreamFailure::Connect(details) | UpstreamFailure::Transport(details) => {
                Self::UpstreamUnreachable { details }
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response<Body> {
        json_response(self.status(), &self.body())
    }
}

/// First `max_chars` characters of `text` followed by an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_body() {
        let err = RelayError::MethodNotAllowed;
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.body(), json!({ "error": "Method not allowed" }));
    }

    #[test]
    fn test_configuration_names_the_credential() {
        let err = RelayError::Configuration { credential: "RELAY_API_KEY".into() };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), json!({ "error": "RELAY_API_KEY not configured" }));
    }

    #[test]
    fn test_upstream_error_keeps_status() {
        let err = RelayError::Upstream {
            status: StatusCode::SERVICE_UNAVAILABLE,
            details: "boom".into(),
        };
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            err.body(),
            json!({ "error": "Upstream API error", "status": 503, "details": "boom" })
        );
    }

    #[test]
    fn test_invalid_payload_preview_is_bounded() {
        let long = "x".repeat(500);
        let RelayError::InvalidUpstreamPayload { raw } = RelayError::invalid_payload(&long) else {
            panic!("wrong variant");
        };
        assert_eq!(raw.len(), RAW_PREVIEW_CHARS + 3);
        assert!(raw.ends_with("..."));

        // multi-byte characters are never split
        let wide = "é".repeat(300);
        assert_eq!(preview(&wide, 200).chars().count(), 203);
        assert_eq!(preview("not-json", 200), "not-json...");
    }

    #[test]
    fn test_redaction() {
        let key = ApiKey::new("sk-live").unwrap();
        let err = RelayError::internal("header Bearer sk-live rejected").redacted(Some(&key));
        assert_eq!(
            err.body(),
            json!({ "error": "Internal Server Error", "details": "header Bearer [REDACTED] rejected" })
        );
    }

    #[test]
    fn test_upstream_failure_mapping() {
        let err: RelayError = UpstreamFailure::Timeout("slow".into()).into();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        let err: RelayError = UpstreamFailure::Connect("refused".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.outcome(), "unreachable");
    }
}
