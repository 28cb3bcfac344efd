//! Buffered upstream calls and response translation.
//!
//! # Responsibilities
//! - Issue the call with the bounded timeout
//! - Map transport failures to `UpstreamUnavailable`
//! - Return JSON bodies as JSON, anything else raw, always with the
//!   upstream status
//!
//! # Design Decisions
//! - JSON is validated, never re-serialized, so the caller gets upstream's
//!   exact bytes
//! - The JSON-then-raw fallback cannot fail

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use serde::de::IgnoredAny;

use crate::observability::metrics;
use crate::proxy::client::UpstreamClient;
use crate::proxy::error::ProxyError;
use crate::proxy::forward::{OutboundRequest, DEFAULT_CONTENT_TYPE};

/// Content type used for non-JSON bodies that arrive without one.
pub const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// Send `request`, read the full body, and translate it for the caller.
pub async fn forward_buffered(
    client: &UpstreamClient,
    request: OutboundRequest,
) -> Result<Response, ProxyError> {
    let response = client.send_buffered(request).await.map_err(unavailable)?;

    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let body = response.bytes().await.map_err(unavailable)?;

    tracing::debug!(status = %status, bytes = body.len(), "Upstream responded");

    Ok(translate(status, content_type, body))
}

fn unavailable(e: reqwest::Error) -> ProxyError {
    tracing::warn!(
        error = %e,
        timeout = e.is_timeout(),
        connect = e.is_connect(),
        "Upstream request failed"
    );
    metrics::record_upstream_error("buffered");
    ProxyError::UpstreamUnavailable
}

/// Build the caller response from a complete upstream response.
///
/// Valid JSON goes out as `application/json`; anything else keeps the
/// upstream content type, or `text/plain` when none was given.
pub fn translate(status: StatusCode, content_type: Option<HeaderValue>, body: Bytes) -> Response {
    let content_type = if is_json(&body) {
        HeaderValue::from_static(DEFAULT_CONTENT_TYPE)
    } else {
        content_type.unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE))
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

fn is_json(body: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(body).is_ok()
}
