//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack, route table)
//!     → request.rs (request ID assigned and echoed)
//!     → proxy subsystem (auth, forward, relay or translate)
//!     → proxy::sanitize::render_errors (error bodies)
//!     → Send to client
//! ```

pub mod landing;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
