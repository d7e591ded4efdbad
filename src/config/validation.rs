//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (the client's breaker name is registered)
//! - Validate value ranges (timeouts > 0, percentages <= 100)
//! - Detect duplicate breaker names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GalfConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BackoffConfig, GalfConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GalfConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let client = &config.client;
    if client.timeout_ms == 0 {
        errors.push(ValidationError::new("client.timeout_ms", "must be greater than 0"));
    }
    if client.content_type.trim().is_empty() {
        errors.push(ValidationError::new("client.content_type", "must not be empty"));
    }
    for status in &client.retryable_statuses {
        if !(100..=599).contains(status) {
            errors.push(ValidationError::new(
                "client.retryable_statuses",
                format!("{status} is not an HTTP status"),
            ));
        }
    }
    match client.backoff {
        BackoffConfig::Constant { .. } => {}
        BackoffConfig::Linear { base_ms, max_ms } | BackoffConfig::Exponential { base_ms, max_ms } => {
            if base_ms > max_ms {
                errors.push(ValidationError::new(
                    "client.backoff",
                    format!("base_ms ({base_ms}) exceeds max_ms ({max_ms})"),
                ));
            }
        }
    }

    let mut names = HashSet::new();
    for (i, breaker) in config.circuit_breakers.iter().enumerate() {
        let field = |name: &str| format!("circuit_breakers[{i}].{name}");
        if breaker.name.trim().is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !names.insert(breaker.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate circuit breaker '{}'", breaker.name),
            ));
        }
        if breaker.timeout_ms == 0 {
            errors.push(ValidationError::new(field("timeout_ms"), "must be greater than 0"));
        }
        if breaker.max_concurrent_requests == 0 {
            errors.push(ValidationError::new(
                field("max_concurrent_requests"),
                "must be greater than 0",
            ));
        }
        if breaker.error_percent_threshold > 100 {
            errors.push(ValidationError::new(
                field("error_percent_threshold"),
                "must be between 0 and 100",
            ));
        }
        if breaker.rolling_window_secs == 0 {
            errors.push(ValidationError::new(
                field("rolling_window_secs"),
                "must be greater than 0",
            ));
        }
    }

    if let Some(name) = &client.circuit_breaker {
        if !names.contains(name.as_str()) {
            errors.push(ValidationError::new(
                "client.circuit_breaker",
                format!("'{name}' is not a configured circuit breaker"),
            ));
        }
    }

    if let Some(auth) = &config.auth {
        if let Err(e) = Url::parse(&auth.token_url) {
            errors.push(ValidationError::new("auth.token_url", e.to_string()));
        }
        if auth.client_id.is_empty() {
            errors.push(ValidationError::new("auth.client_id", "must not be empty"));
        }
        if auth.timeout_ms == 0 {
            errors.push(ValidationError::new("auth.timeout_ms", "must be greater than 0"));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CircuitBreakerEntry;

    fn breaker(name: &str) -> CircuitBreakerEntry {
        toml::from_str(&format!("name = \"{name}\"")).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GalfConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GalfConfig::default();
        config.client.timeout_ms = 0;
        config.client.circuit_breaker = Some("missing".to_string());
        config.client.retryable_statuses = vec![503, 42];
        config.circuit_breakers = vec![breaker("orders"), breaker("orders")];
        config.circuit_breakers[1].error_percent_threshold = 150;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            [
                "client.timeout_ms",
                "client.retryable_statuses",
                "circuit_breakers[1].name",
                "circuit_breakers[1].error_percent_threshold",
                "client.circuit_breaker",
            ]
        );
    }

    #[test]
    fn test_client_breaker_must_be_configured() {
        let mut config = GalfConfig::default();
        config.client.circuit_breaker = Some("orders".to_string());
        assert!(validate_config(&config).is_err());

        config.circuit_breakers.push(breaker("orders"));
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = GalfConfig::default();
        config.client.backoff = BackoffConfig::Exponential {
            base_ms: 500,
            max_ms: 100,
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "client.backoff");
    }
}
