//! Outbound request construction and stream classification.
//!
//! # Responsibilities
//! - Build the upstream URL from the base URL and the inbound path
//! - Replace caller credentials with the upstream credential
//! - Copy the body byte-for-byte
//! - Decide between live relay and buffered translation
//!
//! # Design Decisions
//! - Upstream headers are rendered once at startup; building a request
//!   cannot fail
//! - Caller headers other than Content-Type are not forwarded
//! - No I/O happens here

use axum::body::Bytes;
use axum::http::header::{
    HeaderName, InvalidHeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use axum::http::{HeaderMap, HeaderValue, Method};

use crate::config::ProxyConfig;

/// Media type of incremental (server-sent event) responses.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Content type assumed when the caller sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Marker header identifying the relay to the upstream.
pub const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

const STREAM_MARKERS: [&[u8]; 2] = [br#""stream":true"#, br#""stream": true"#];

/// Whether a request body asks for a streamed response.
///
/// A plain byte search for `"stream":true` or `"stream": true`. The body is
/// never parsed, so malformed JSON simply classifies as buffered. Other
/// spellings (`"stream" : true`, `"stream":1`) are deliberately not matched.
pub fn is_stream_request(body: &[u8]) -> bool {
    STREAM_MARKERS
        .iter()
        .any(|marker| body.windows(marker.len()).any(|window| window == *marker))
}

/// How the upstream response is delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Relay chunks live as they arrive.
    Stream,
    /// Read the whole response, then translate it.
    Buffered,
}

impl ResponseMode {
    pub fn classify(body: &[u8]) -> Self {
        if is_stream_request(body) {
            Self::Stream
        } else {
            Self::Buffered
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Buffered => "buffered",
        }
    }
}

/// A fully built request for the upstream.
#[derive(Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Headers carry the upstream credential.
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Builds outbound requests from inbound ones.
#[derive(Clone)]
pub struct Forwarder {
    base_url: String,
    models_path: String,
    authorization: HeaderValue,
    user_agent: HeaderValue,
    powered_by: HeaderValue,
}

impl Forwarder {
    /// Render the fixed upstream headers from config.
    ///
    /// Fails if the credential or identity strings are not valid header values.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, InvalidHeaderValue> {
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", config.upstream.credential))?;
        authorization.set_sensitive(true);

        Ok(Self {
            base_url: config.upstream.base_url.trim_end_matches('/').to_string(),
            models_path: config.upstream.models_path.clone(),
            authorization,
            user_agent: HeaderValue::from_str(&config.identity.user_agent)?,
            powered_by: HeaderValue::from_str(&config.identity.powered_by)?,
        })
    }

    /// Build the upstream request for an authorized inbound call.
    ///
    /// `path_and_query` is appended to the base URL verbatim.
    pub fn build(
        &self,
        method: Method,
        path_and_query: &str,
        inbound: &HeaderMap,
        body: Bytes,
    ) -> OutboundRequest {
        let content_type = inbound
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut headers = HeaderMap::with_capacity(5);
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(CONTENT_TYPE, content_type);
        headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(X_POWERED_BY, self.powered_by.clone());

        OutboundRequest {
            method,
            url: format!("{}{}", self.base_url, path_and_query),
            headers,
            body,
        }
    }

    /// The fixed model listing request.
    pub fn models_request(&self) -> OutboundRequest {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        OutboundRequest {
            method: Method::GET,
            url: format!("{}{}", self.base_url, self.models_path),
            headers,
            body: Bytes::new(),
        }
    }
}
