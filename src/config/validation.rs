//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check the upstream base URL is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// Paths served by the relay itself.
pub const RESERVED_PATHS: &[&str] = &["/healthz"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("relay.path must start with '/', got '{0}'")]
    RelativePath(String),

    #[error("relay.path '{0}' is reserved")]
    ReservedPath(String),

    #[error("invalid upstream base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{0} not configured")]
    MissingCredential(String),
}

/// Build the dispatch URL `{base}/chat` from a base URL.
pub fn chat_url(base: &str) -> Result<Url, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidBaseUrl {
        url: base.to_string(),
        reason,
    };

    let url = Url::parse(&format!("{}/chat", base.trim_end_matches('/')))
        .map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

/// Check the configuration for semantic errors.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "listener.bind_address" });
    }

    if !config.relay.path.starts_with('/') {
        errors.push(ValidationError::RelativePath(config.relay.path.clone()));
    } else if RESERVED_PATHS.contains(&config.relay.path.as_str()) {
        errors.push(ValidationError::ReservedPath(config.relay.path.clone()));
    }

    if config.upstream.api_key_env.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "upstream.api_key_env" });
    }

    if let Err(e) = chat_url(&config.upstream.base_url) {
        errors.push(e);
    }

    let non_zero = [
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.response_timeout_secs", config.upstream.response_timeout_secs),
        ("upstream.stream_idle_timeout_secs", config.upstream.stream_idle_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("limits.max_body_bytes", config.limits.max_body_bytes as u64),
        ("limits.max_error_body_bytes", config.limits.max_error_body_bytes as u64),
        ("limits.max_response_bytes", config.limits.max_response_bytes as u64),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
