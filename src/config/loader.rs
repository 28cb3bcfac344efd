//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `auth.public_token`.
pub const ENV_AUTH_TOKEN: &str = "RELAY_AUTH_TOKEN";
/// Environment variable overriding `upstream.credential`.
pub const ENV_UPSTREAM_CREDENTIAL: &str = "RELAY_UPSTREAM_CREDENTIAL";
/// Environment variable overriding `upstream.base_url`.
pub const ENV_UPSTREAM_URL: &str = "RELAY_UPSTREAM_URL";
/// Environment variable overriding `listener.bind_address`.
pub const ENV_BIND_ADDRESS: &str = "RELAY_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply process environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    finish(config)
}

/// Defaults plus process environment overrides, validated. Used when no file
/// is given.
pub fn load_from_env() -> Result<ProxyConfig, ConfigError> {
    finish(ProxyConfig::default())
}

fn finish(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay values from `lookup` (normally the process environment) onto
/// `config`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(token) = get(ENV_AUTH_TOKEN) {
        config.auth.public_token = token;
    }
    if let Some(credential) = get(ENV_UPSTREAM_CREDENTIAL) {
        config.upstream.credential = credential;
    }
    if let Some(url) = get(ENV_UPSTREAM_URL) {
        config.upstream.base_url = url;
    }
    if let Some(addr) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
}
