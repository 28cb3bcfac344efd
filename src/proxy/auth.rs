//! Caller authentication against the public token.
//!
//! Token comparison uses constant-time comparison so response timing does
//! not reveal how much of a guess matched.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::proxy::error::ProxyError;

const BEARER_PREFIX: &str = "Bearer ";

/// Check the caller's `Authorization: Bearer <token>` header.
///
/// The prefix match is case-sensitive; the token is trimmed before
/// comparison. Nothing is logged or echoed.
pub fn authorize(headers: &HeaderMap, public_token: &str) -> Result<(), ProxyError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ProxyError::MissingCredentials)?;

    let presented = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(ProxyError::MissingCredentials)?
        .trim();

    if constant_time_eq(presented, public_token) {
        Ok(())
    } else {
        Err(ProxyError::InvalidToken)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        // Same amount of work as a real comparison.
        let _ = a.ct_eq(a);
        return false;
    }
    a.ct_eq(b).into()
}
