//! Error text sanitization.
//!
//! # Responsibilities
//! - Replace backend-identifying strings in error text with placeholders
//! - Serialize every `ProxyError` body, and nothing else
//!
//! # Design Decisions
//! - Rules apply in order: secrets first, then host, then brand, then
//!   configured extras
//! - Matching ignores ASCII case
//! - `render_errors` runs as a router-wide layer so no handler can write
//!   error text directly

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::ProxyConfig;
use crate::proxy::error::ErrorDetail;

/// Placeholder for secrets.
pub const REDACTED: &str = "[redacted]";
/// Placeholder for the upstream host.
pub const HOST_PLACEHOLDER: &str = "backend";
/// Placeholder for the upstream brand.
pub const BRAND_PLACEHOLDER: &str = "api";

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    rules: Vec<(String, String)>,
}

impl Sanitizer {
    /// Rules are applied in the given order. Empty patterns are dropped.
    pub fn new(rules: Vec<(String, String)>) -> Self {
        Self {
            rules: rules.into_iter().filter(|(p, _)| !p.is_empty()).collect(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        let mut rules = vec![
            (config.upstream.credential.clone(), REDACTED.to_string()),
            (config.auth.public_token.clone(), REDACTED.to_string()),
        ];
        if let Some(host) = config.upstream.host() {
            rules.push((host, HOST_PLACEHOLDER.to_string()));
        }
        if let Some(brand) = config.upstream.brand_name() {
            rules.push((brand, BRAND_PLACEHOLDER.to_string()));
        }
        rules.extend(
            config
                .sanitize
                .rules
                .iter()
                .map(|r| (r.pattern.clone(), r.replacement.clone())),
        );
        Self::new(rules)
    }

    pub fn sanitize(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, (pattern, replacement)| {
                replace_ignore_ascii_case(&acc, pattern, replacement)
            })
    }

    /// Render the JSON error body `{"detail": "..."}`.
    pub fn render(&self, status: StatusCode, detail: &ErrorDetail) -> Response {
        let body = serde_json::json!({ "detail": self.sanitize(&detail.0) });
        (status, Json(body)).into_response()
    }
}

/// Replace every error response's deferred detail with a sanitized JSON body.
pub async fn render_errors(
    State(sanitizer): State<Arc<Sanitizer>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<ErrorDetail>() {
        Some(detail) => {
            let (mut parts, _) = response.into_parts();
            let rendered = sanitizer.render(parts.status, &detail);
            let (rendered_parts, body) = rendered.into_parts();
            parts.headers.extend(rendered_parts.headers);
            Response::from_parts(parts, body)
        }
        None => response,
    }
}

/// ASCII lowercasing keeps byte offsets, so matches found in the lowered
/// copy index straight into the original.
fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in lower_haystack.match_indices(&lower_needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(replacement);
        last = start + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}
