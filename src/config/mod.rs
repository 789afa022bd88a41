//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!
//! RelayConfig.upstream + environment (credential, base URL override)
//!     → upstream.rs (UpstreamSettings, resolved once at startup)
//!     → injected into the relay handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - The credential only ever comes from the environment, never the file

pub mod credential;
pub mod loader;
pub mod schema;
pub mod upstream;
pub mod validation;

pub use credential::ApiKey;
pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    LimitsConfig, ListenerConfig, ObservabilityConfig, RelayConfig, RelayEndpointConfig,
    TimeoutConfig, UpstreamConfig,
};
pub use upstream::UpstreamSettings;
pub use validation::ValidationError;
