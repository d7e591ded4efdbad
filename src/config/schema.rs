//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a client.
//! All types derive Serde traits for deserialization from config files, and
//! convert into the runtime types the client is built from.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::source::OAuthSettings;
use crate::error::Error;
use crate::http::client::ClientOptions;
use crate::resilience::{Backoff, CircuitBreakerConfig};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GalfConfig {
    /// Client behavior (timeouts, retries, breaker name).
    pub client: ClientConfig,

    /// Token endpoint. No `Authorization` header is sent without it.
    pub auth: Option<AuthConfig>,

    /// Circuit breaker commands registered at startup and on reload.
    pub circuit_breakers: Vec<CircuitBreakerEntry>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-attempt transport timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    pub backoff: BackoffConfig,

    /// Log request and response summaries at debug level.
    pub show_debug: bool,

    /// Circuit breaker command the client runs its calls under.
    pub circuit_breaker: Option<String>,

    pub content_type: String,

    /// Statuses retried while the retry budget lasts.
    pub retryable_statuses: Vec<u16>,

    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let defaults = ClientOptions::default();
        Self {
            timeout_ms: defaults.timeout.as_millis() as u64,
            max_retries: defaults.max_retries,
            backoff: BackoffConfig::default(),
            show_debug: defaults.show_debug,
            circuit_breaker: None,
            content_type: defaults.content_type,
            retryable_statuses: defaults.retryable_statuses,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn to_options(&self) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            backoff: self.backoff.to_backoff(),
            show_debug: self.show_debug,
            circuit_breaker: self.circuit_breaker.clone(),
            content_type: self.content_type.clone(),
            retryable_statuses: self.retryable_statuses.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

/// Backoff strategy, tagged by `strategy`.
///
/// ```toml
/// [client.backoff]
/// strategy = "exponential"
/// base_ms = 100
/// max_ms = 2000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    Constant { delay_ms: u64 },
    Linear { base_ms: u64, max_ms: u64 },
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Constant { delay_ms: 100 }
    }
}

impl BackoffConfig {
    pub fn to_backoff(self) -> Backoff {
        match self {
            BackoffConfig::Constant { delay_ms } => Backoff::Constant(Duration::from_millis(delay_ms)),
            BackoffConfig::Linear { base_ms, max_ms } => Backoff::Linear {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
            },
            BackoffConfig::Exponential { base_ms, max_ms } => Backoff::Exponential {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
            },
        }
    }
}

/// OAuth2 client-credentials endpoint.
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub token_url: String,

    pub client_id: String,

    pub client_secret: String,

    #[serde(default)]
    pub scope: Option<String>,

    /// Token request timeout in milliseconds.
    #[serde(default = "default_auth_timeout_ms")]
    pub timeout_ms: u64,

    /// Seconds before expiry at which a token is refreshed.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

fn default_auth_timeout_ms() -> u64 {
    10_000
}

fn default_refresh_margin_secs() -> u64 {
    30
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("timeout_ms", &self.timeout_ms)
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    pub fn to_settings(&self) -> Result<OAuthSettings, Error> {
        let token_url = Url::parse(&self.token_url).map_err(|e| Error::InvalidUrl {
            url: self.token_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(OAuthSettings {
            token_url,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: self.scope.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
        })
    }
}

/// A named circuit breaker command.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerEntry {
    /// Command name clients refer to.
    pub name: String,

    #[serde(default = "default_breaker_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_sleep_window_ms")]
    pub sleep_window_ms: u64,

    #[serde(default = "default_request_volume_threshold")]
    pub request_volume_threshold: u32,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_error_percent_threshold")]
    pub error_percent_threshold: u8,

    #[serde(default = "default_rolling_window_secs")]
    pub rolling_window_secs: u64,
}

fn default_breaker_timeout_ms() -> u64 {
    1_000
}

fn default_sleep_window_ms() -> u64 {
    5_000
}

fn default_request_volume_threshold() -> u32 {
    20
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_error_percent_threshold() -> u8 {
    50
}

fn default_rolling_window_secs() -> u64 {
    10
}

impl CircuitBreakerEntry {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            sleep_window: Duration::from_millis(self.sleep_window_ms),
            request_volume_threshold: self.request_volume_threshold,
            max_concurrent_requests: self.max_concurrent_requests,
            error_percent_threshold: self.error_percent_threshold,
            rolling_window: Duration::from_secs(self.rolling_window_secs),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: GalfConfig = toml::from_str("").unwrap();
        let options = config.client.to_options();
        assert_eq!(options, ClientOptions::default());
        assert!(config.auth.is_none());
        assert!(config.circuit_breakers.is_empty());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_full_config_parses() {
        let config: GalfConfig = toml::from_str(
            r#"
            [client]
            timeout_ms = 2500
            max_retries = 4
            circuit_breaker = "orders"
            content_type = "application/my-custom-type"

            [client.backoff]
            strategy = "exponential"
            base_ms = 50
            max_ms = 800

            [auth]
            token_url = "https://auth.example.com/oauth/token"
            client_id = "svc"
            client_secret = "s3cret"

            [[circuit_breakers]]
            name = "orders"
            timeout_ms = 200
            request_volume_threshold = 5

            [observability]
            log_level = "debug"
            log_format = "pretty"
            "#,
        )
        .unwrap();

        let options = config.client.to_options();
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert_eq!(options.max_retries, 4);
        assert_eq!(options.circuit_breaker.as_deref(), Some("orders"));
        assert_eq!(
            options.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(50),
                max: Duration::from_millis(800),
            }
        );

        let breaker = config.circuit_breakers[0].to_breaker_config();
        assert_eq!(breaker.timeout, Duration::from_millis(200));
        assert_eq!(breaker.request_volume_threshold, 5);
        assert_eq!(breaker.sleep_window, Duration::from_secs(5));
        assert_eq!(breaker.error_percent_threshold, 50);

        let auth = config.auth.unwrap();
        let settings = auth.to_settings().unwrap();
        assert_eq!(settings.refresh_margin, Duration::from_secs(30));
        assert!(!format!("{auth:?}").contains("s3cret"));

        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_bad_token_url_is_rejected() {
        let auth = AuthConfig {
            token_url: "not a url".to_string(),
            client_id: "svc".to_string(),
            client_secret: "s".to_string(),
            scope: None,
            timeout_ms: 1000,
            refresh_margin_secs: 30,
        };
        assert!(matches!(auth.to_settings(), Err(Error::InvalidUrl { .. })));
    }
}
