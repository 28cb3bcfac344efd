//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that both secrets are present
//! - Check the upstream base URL is an absolute http(s) URL with a host
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{HostBrand, ProxyConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("auth.public_token must not be empty")]
    MissingPublicToken,

    #[error("upstream.credential must not be empty")]
    MissingCredential,

    #[error("upstream.base_url is invalid: {0}")]
    InvalidBaseUrl(String),

    #[error("upstream.brand must be set: no brand can be derived safely from host {0}")]
    AmbiguousBrand(String),

    #[error("upstream.models_path must start with '/'")]
    InvalidModelsPath,

    #[error("listener.bind_address is not a socket address: {0}")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("sanitize rule pattern must not be empty")]
    EmptySanitizePattern,
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.public_token.trim().is_empty() {
        errors.push(ValidationError::MissingPublicToken);
    }
    if config.upstream.credential.trim().is_empty() {
        errors.push(ValidationError::MissingCredential);
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(ValidationError::InvalidBaseUrl(format!(
                    "unsupported scheme '{}'",
                    url.scheme()
                )));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::InvalidBaseUrl("missing host".to_string()));
            }
        }
        Err(e) => errors.push(ValidationError::InvalidBaseUrl(e.to_string())),
    }

    if config.upstream.brand.is_empty() && config.upstream.host_brand() == HostBrand::Ambiguous {
        errors.push(ValidationError::AmbiguousBrand(
            config.upstream.host().unwrap_or_default(),
        ));
    }

    if !config.upstream.models_path.starts_with('/') {
        errors.push(ValidationError::InvalidModelsPath);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.buffered_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("buffered_secs"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.sanitize.rules.iter().any(|r| r.pattern.is_empty()) {
        errors.push(ValidationError::EmptySanitizePattern);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
