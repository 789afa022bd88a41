//! Chat relay subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → handler.rs (preflight, method gate, credential gate, dispatch)
//!     → upstream.rs (UpstreamClient: reqwest in production)
//!     → buffered: bounded read, JSON check, single response
//!     → streaming: stream.rs pump, chunk by chunk
//!     → error.rs (every failure rendered as structured JSON)
//!
//! Every step reports to observer.rs (RelayObserver), never to a logger directly.
//! ```
//!
//! # Design Decisions
//! - No shared mutable state: the handler only holds immutable settings and
//!   injected capabilities
//! - Inbound body bytes are forwarded as received, never re-serialized
//! - No retries: an upstream failure is classified and returned once

pub mod error;
pub mod handler;
pub mod observer;
pub mod stream;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use error::RelayError;
pub use handler::{RelayHandler, RelayMode, RelayOptions};
pub use observer::{RelayEvent, RelayObserver, RequestContext, StreamEnd, StreamStats, TracingObserver};
pub use upstream::{ChunkStream, ReqwestUpstream, UpstreamClient, UpstreamFailure, UpstreamRequest, UpstreamResponse};
