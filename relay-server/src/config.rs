//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables. The provider API token
//! is the only mandatory value; everything else falls back to a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Default provider endpoint (EU region).
pub const DEFAULT_API_BASE: &str = "https://api.eu.onfido.com";

/// Default provider API version prefix.
pub const DEFAULT_API_VERSION: &str = "v3.6";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ONFIDO_API_TOKEN must be set")]
    MissingApiToken,
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which side wins when the live run snapshot and the accumulated webhook
/// output both carry a non-null value for the same field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePrecedence {
    /// Webhook fields overlay the live snapshot.
    #[default]
    Webhook,
    /// Live snapshot fields overlay the webhook output.
    Live,
}

impl FromStr for MergePrecedence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(MergePrecedence::Webhook),
            "live" => Ok(MergePrecedence::Live),
            other => Err(other.to_string()),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider base URL, without trailing slash
    pub api_base: String,

    /// Provider API version path segment
    pub api_version: String,

    /// Provider API token
    pub api_token: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Explicit CORS origin allow-list; `None` means any origin
    pub cors_origins: Option<Vec<String>>,

    /// Hosting domain whose subdomains are always allowed by CORS
    pub cors_trusted_domain: Option<String>,

    /// Timeout for outbound provider calls in milliseconds
    pub request_timeout_ms: u64,

    /// Webhook token used to verify delivery signatures
    pub webhook_token: Option<String>,

    /// Maximum number of run records held in memory
    pub store_capacity: usize,

    /// Seconds a run record may stay untouched before expiring (0 = never)
    pub store_ttl_secs: u64,

    /// Precedence between live and webhook data in the run view
    pub merge_precedence: MergePrecedence,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = env::var("ONFIDO_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingApiToken)?;

        let merge_precedence = match env::var("MERGE_PRECEDENCE") {
            Ok(raw) => raw.parse().map_err(|value| ConfigError::Invalid {
                name: "MERGE_PRECEDENCE",
                value,
            })?,
            Err(_) => MergePrecedence::default(),
        };

        Ok(Config {
            api_base: env::var("ONFIDO_API_BASE")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),

            api_version: env::var("ONFIDO_API_VERSION")
                .map(|v| v.trim().trim_matches('/').to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),

            api_token,

            port: parse_or("PORT", 8080),

            cors_origins: parse_csv("CORS_ORIGINS").filter(|list| !list.is_empty()),

            cors_trusted_domain: env::var("CORS_TRUSTED_DOMAIN")
                .ok()
                .map(|v| v.trim().trim_start_matches("*.").to_string())
                .filter(|v| !v.is_empty()),

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 10_000),

            webhook_token: env::var("ONFIDO_WEBHOOK_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            store_capacity: parse_or("RUN_STORE_CAPACITY", 10_000),

            store_ttl_secs: parse_or("RUN_STORE_TTL_SECS", 86_400),

            merge_precedence,
        })
    }

    /// Outbound request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Record time-to-live, if expiry is enabled.
    pub fn store_ttl(&self) -> Option<Duration> {
        (self.store_ttl_secs > 0).then(|| Duration::from_secs(self.store_ttl_secs))
    }
}

/// Parse an environment variable, warning and falling back to `default` when
/// the value is present but malformed.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "invalid_config_value_using_default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
