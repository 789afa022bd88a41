//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.
//! The upstream credential is deliberately absent: it is only ever read from
//! the environment (see [`crate::config::UpstreamSettings`]).

use serde::{Deserialize, Serialize};

/// Upstream used when neither the config file nor the environment names one.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://ai-runtime-446257178793.europe-west1.run.app";

/// Root configuration for the chat relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Inbound relay endpoint settings.
    pub relay: RelayEndpointConfig,

    /// Upstream chat API settings.
    pub upstream: UpstreamConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Inbound timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Inbound endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayEndpointConfig {
    /// Path the relay answers on.
    pub path: String,

    /// Reject request bodies that are not well-formed JSON.
    pub validate_json_body: bool,
}

impl Default for RelayEndpointConfig {
    fn default() -> Self {
        Self {
            path: "/api/chat".to_string(),
            validate_json_body: true,
        }
    }
}

/// Upstream chat API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; `/chat` is appended on dispatch.
    pub base_url: String,

    /// Environment variable holding the bearer credential.
    pub api_key_env: String,

    /// Environment variable that overrides `base_url` when set.
    pub base_url_env: String,

    /// Refuse to start without a credential instead of answering 500 per request.
    pub require_api_key: bool,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for response headers (and the full body in buffered mode).
    pub response_timeout_secs: u64,

    /// Longest allowed gap between two streamed chunks.
    pub stream_idle_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key_env: "RELAY_API_KEY".to_string(),
            base_url_env: "RELAY_API_URL".to_string(),
            require_api_key: false,
            connect_timeout_secs: 10,
            response_timeout_secs: 60,
            stream_idle_timeout_secs: 120,
        }
    }
}

/// Size limits, all in bytes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound request body.
    pub max_body_bytes: usize,

    /// How much of an upstream error body is read for `details`.
    pub max_error_body_bytes: usize,

    /// Maximum upstream body accepted in buffered mode.
    pub max_response_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            max_error_body_bytes: 64 * 1024,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (until response headers are produced) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.relay.path, "/api/chat");
        assert_eq!(config.upstream.base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(config.upstream.api_key_env, "RELAY_API_KEY");
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "http://127.0.0.1:9000"

            [limits]
            max_body_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.upstream.connect_timeout_secs, 10);
        assert_eq!(config.limits.max_body_bytes, 1024);
        assert_eq!(config.limits.max_error_body_bytes, 64 * 1024);
    }
}
