//! Upstream settings resolved once at startup.

use std::time::Duration;
use url::Url;

use crate::config::credential::ApiKey;
use crate::config::schema::UpstreamConfig;
use crate::config::validation::{chat_url, ValidationError};

/// Everything the relay needs to reach the upstream, fully resolved.
///
/// Built once from [`UpstreamConfig`] plus the environment; handlers never
/// read the environment themselves.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// `{base_url}/chat`.
    pub chat_url: Url,
    /// `None` when the credential variable is unset or blank.
    pub api_key: Option<ApiKey>,
    /// Name reported in the "not configured" error.
    pub credential_name: String,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl UpstreamSettings {
    /// Resolve using the process environment.
    pub fn from_env(config: &UpstreamConfig) -> Result<Self, ValidationError> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit variable lookup.
    pub fn resolve<F>(config: &UpstreamConfig, lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(&config.base_url_env)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| config.base_url.clone());
        let chat_url = chat_url(base_url.trim())?;

        let api_key = lookup(&config.api_key_env).and_then(ApiKey::new);
        if api_key.is_none() && config.require_api_key {
            return Err(ValidationError::MissingCredential(config.api_key_env.clone()));
        }

        Ok(Self {
            chat_url,
            api_key,
            credential_name: config.api_key_env.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            response_timeout: Duration::from_secs(config.response_timeout_secs),
            stream_idle_timeout: Duration::from_secs(config.stream_idle_timeout_secs),
        })
    }

    /// Settings pointing at `base_url` with the given key and default timeouts.
    pub fn with_key(base_url: &str, api_key: Option<ApiKey>) -> Result<Self, ValidationError> {
        let config = UpstreamConfig {
            base_url: base_url.to_string(),
            ..UpstreamConfig::default()
        };
        let mut settings = Self::resolve(&config, |_| None)?;
        settings.api_key = api_key;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_resolves_key_and_default_url() {
        let settings =
            UpstreamSettings::resolve(&UpstreamConfig::default(), env(&[("RELAY_API_KEY", "sk-1")]))
                .unwrap();
        assert_eq!(settings.api_key.unwrap().bearer(), "Bearer sk-1");
        assert_eq!(
            settings.chat_url.as_str(),
            "https://ai-runtime-446257178793.europe-west1.run.app/chat"
        );
        assert_eq!(settings.credential_name, "RELAY_API_KEY");
    }

    #[test]
    fn test_env_overrides_base_url() {
        let settings = UpstreamSettings::resolve(
            &UpstreamConfig::default(),
            env(&[("RELAY_API_URL", "http://localhost:7000/")]),
        )
        .unwrap();
        assert_eq!(settings.chat_url.as_str(), "http://localhost:7000/chat");
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_missing_key_is_fatal_only_when_required() {
        let mut config = UpstreamConfig::default();
        assert!(UpstreamSettings::resolve(&config, env(&[])).is_ok());

        config.require_api_key = true;
        let err = UpstreamSettings::resolve(&config, env(&[("RELAY_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ValidationError::MissingCredential("RELAY_API_KEY".into()));
        assert_eq!(err.to_string(), "RELAY_API_KEY not configured");
    }
}
