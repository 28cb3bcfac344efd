//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
///
/// Built once at startup and shared read-only through `Arc`. Never serialized
/// back to callers; `Debug` redacts both secrets.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Caller-facing authentication.
    pub auth: AuthConfig,

    /// The single upstream API everything is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Headers that identify the relay to the upstream.
    pub identity: IdentityConfig,

    /// Additional error-text substitutions.
    pub sanitize: SanitizeConfig,

    /// Inbound request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("listener", &self.listener)
            .field("auth", &self.auth)
            .field("upstream", &self.upstream)
            .field("timeouts", &self.timeouts)
            .field("identity", &self.identity)
            .field("sanitize", &self.sanitize)
            .field("security", &self.security)
            .field("observability", &self.observability)
            .finish()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Caller-facing authentication.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Public bearer token callers present. Rotatable without touching the
    /// upstream credential.
    pub public_token: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("public_token", &redacted(&self.public_token))
            .finish()
    }
}

/// Upstream API settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every request path is appended to (e.g. "https://api.example.com").
    pub base_url: String,

    /// Private credential sent upstream as `Authorization: Bearer <credential>`.
    pub credential: String,

    /// Path of the model listing endpoint on the upstream.
    pub models_path: String,

    /// Brand substring scrubbed from error text. Derived from the upstream
    /// host when empty.
    pub brand: String,

    /// Honour `HTTP(S)_PROXY` environment variables for upstream calls.
    pub system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com".to_string(),
            credential: String::new(),
            models_path: "/v1/models".to_string(),
            brand: String::new(),
            system_proxy: true,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("credential", &redacted(&self.credential))
            .field("models_path", &self.models_path)
            .field("brand", &self.brand)
            .field("system_proxy", &self.system_proxy)
            .finish()
    }
}

impl UpstreamConfig {
    /// Host component of the base URL, if it parses.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Brand name to scrub: the configured value, or the brand label
    /// derived from the upstream host.
    pub fn brand_name(&self) -> Option<String> {
        if !self.brand.is_empty() {
            return Some(self.brand.clone());
        }
        match self.host_brand() {
            HostBrand::Label(label) => Some(label),
            HostBrand::Absent | HostBrand::Ambiguous => None,
        }
    }

    /// Brand label of the upstream host ("fast.acme.net" → "acme",
    /// "api.acme.co.uk" → "acme").
    ///
    /// Generic second-level labels under a two-letter country code are
    /// skipped. Labels too short to scrub safely are `Ambiguous`.
    pub fn host_brand(&self) -> HostBrand {
        let Some(host) = self.host() else {
            return HostBrand::Absent;
        };
        if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
            return HostBrand::Absent;
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        let n = labels.len();
        if n < 2 {
            return HostBrand::Absent;
        }

        let country_code = labels[n - 1].len() == 2;
        let generic = GENERIC_SECOND_LEVEL.contains(&labels[n - 2].to_ascii_lowercase().as_str());
        let label = match (country_code && generic, n) {
            (true, 2) => return HostBrand::Ambiguous,
            (true, _) => labels[n - 3],
            (false, _) => labels[n - 2],
        };

        if label.len() < MIN_BRAND_LEN {
            HostBrand::Ambiguous
        } else {
            HostBrand::Label(label.to_string())
        }
    }
}

/// Second-level labels used as registries under country-code domains
/// (`co.uk`, `com.au`, `ne.jp`).
const GENERIC_SECOND_LEVEL: [&str; 10] = [
    "ac", "co", "com", "edu", "gov", "go", "ne", "net", "or", "org",
];

/// Shorter labels would garble ordinary words when scrubbed.
const MIN_BRAND_LEN: usize = 3;

/// Outcome of deriving a brand from the upstream host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostBrand {
    /// Brand label found.
    Label(String),
    /// No brand to scrub (IP address or single-label host).
    Absent,
    /// A guess would be unsafe; `upstream.brand` must be set.
    Ambiguous,
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds (both modes).
    pub connect_secs: u64,

    /// Total timeout for buffered calls in seconds. Streaming calls have none.
    pub buffered_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            buffered_secs: 60,
        }
    }
}

/// Identity the relay presents.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name shown on the landing page.
    pub public_name: String,

    /// `User-Agent` sent upstream.
    pub user_agent: String,

    /// `X-Powered-By` marker sent upstream.
    pub powered_by: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            public_name: "Relay API Gateway".to_string(),
            user_agent: "Relay-Proxy/1.0".to_string(),
            powered_by: "Relay-API".to_string(),
        }
    }
}

/// Extra substitutions applied to error text, after the built-in ones.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SanitizeConfig {
    pub rules: Vec<SanitizeRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SanitizeRule {
    pub pattern: String,
    pub replacement: String,
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
