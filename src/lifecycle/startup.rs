//! Startup orchestration.
//!
//! Turns a validated [`RelayConfig`] into a ready [`HttpServer`]: resolves the
//! upstream settings from config plus environment, builds the reqwest client
//! and wires the production observer.

use std::sync::Arc;
use thiserror::Error;

use crate::config::{RelayConfig, UpstreamSettings, ValidationError};
use crate::http::HttpServer;
use crate::relay::{RelayHandler, RelayOptions, ReqwestUpstream, TracingObserver};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid upstream settings: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Build the server, reading the credential and base URL override from the
/// process environment.
pub fn build_server(config: RelayConfig) -> Result<HttpServer, StartupError> {
    let settings = UpstreamSettings::from_env(&config.upstream)?;
    build_server_with(config, settings)
}

/// Build the server with already resolved upstream settings.
pub fn build_server_with(
    config: RelayConfig,
    settings: UpstreamSettings,
) -> Result<HttpServer, StartupError> {
    if settings.api_key.is_none() {
        tracing::warn!(
            credential = %settings.credential_name,
            "Upstream credential not set; relay requests will fail until it is configured"
        );
    }

    tracing::info!(
        upstream = %settings.chat_url,
        connect_timeout_secs = settings.connect_timeout.as_secs(),
        response_timeout_secs = settings.response_timeout.as_secs(),
        stream_idle_timeout_secs = settings.stream_idle_timeout.as_secs(),
        "Upstream configured"
    );

    let client = ReqwestUpstream::new(&settings)?;
    let relay = RelayHandler::new(
        settings,
        RelayOptions::from_config(&config),
        Arc::new(client),
        Arc::new(TracingObserver),
    );
    Ok(HttpServer::new(config, relay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKey;

    #[test]
    fn test_build_server_with_settings() {
        let mut config = RelayConfig::default();
        config.relay.path = "/api/bitte/chat".into();
        let settings =
            UpstreamSettings::with_key("http://127.0.0.1:9", ApiKey::new("sk-test")).unwrap();

        let server = build_server_with(config, settings).unwrap();
        assert_eq!(server.config().relay.path, "/api/bitte/chat");
    }

    #[test]
    fn test_missing_key_still_builds() {
        let settings = UpstreamSettings::with_key("http://127.0.0.1:9", None).unwrap();
        assert!(build_server_with(RelayConfig::default(), settings).is_ok());
    }
}
