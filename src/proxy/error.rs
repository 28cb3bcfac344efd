//! Errors surfaced to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors the relay reports to callers.
///
/// Display strings are the caller-facing detail text. They are fixed and
/// never interpolate tokens, credentials or upstream addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// No `Authorization` header, or one without the `Bearer ` prefix.
    #[error("Missing or malformed Authorization header.")]
    MissingCredentials,

    /// Bearer token present but not the public token.
    #[error("Invalid authentication token.")]
    InvalidToken,

    /// Network-level failure talking to the upstream (connect, DNS, timeout).
    #[error("API service unavailable. Please try again later.")]
    UpstreamUnavailable,

    /// Inbound body exceeded the configured limit.
    #[error("Request body too large.")]
    BodyTooLarge,

    /// Inbound body failed mid-read (aborted upload, broken connection).
    #[error("Request body could not be read.")]
    BodyUnreadable,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyUnreadable => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error text waiting to be sanitized and serialized.
///
/// Carried as a response extension so that `render_errors` is the single
/// place that turns error text into a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(ErrorDetail(self.to_string()));
        response
    }
}
