//! Credential-substituting forwarding engine.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → auth.rs (public bearer token check)
//!     → forward.rs (outbound request + stream/buffered classification)
//!     → stream.rs (live chunk relay)        [body says "stream": true]
//!     → translate.rs (buffered JSON-or-raw) [everything else]
//!     → Response to caller
//!
//! Any ProxyError
//!     → error.rs (status + ErrorDetail extension, no body)
//!     → sanitize.rs render_errors (the only place error text is written)
//! ```
//!
//! # Design Decisions
//! - The upstream credential is attached only in forward.rs and never read back
//! - Streaming classification is a byte scan, not a JSON parse
//! - No retries anywhere: a failure is reported once
//! - Streaming relays have no timeout; buffered calls do

pub mod auth;
pub mod client;
pub mod error;
pub mod forward;
pub mod models;
pub mod sanitize;
pub mod stream;
pub mod translate;

pub use auth::authorize;
pub use client::UpstreamClient;
pub use error::{ErrorDetail, ProxyError};
pub use forward::{is_stream_request, Forwarder, OutboundRequest, ResponseMode};
pub use sanitize::{render_errors, Sanitizer};
