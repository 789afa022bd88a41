//! Chat relay library.
//!
//! A small HTTP relay that sits between browser clients and an AI chat
//! upstream: it answers CORS preflights, attaches the server-side bearer
//! credential, and passes responses back either as one JSON document or as a
//! server-sent event stream forwarded chunk by chunk.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::RelayHandler;
