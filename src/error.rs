//! Error taxonomy for the request pipeline.
//!
//! # Retry Classification
//! ```text
//! Auth, ConfigNotFound, CircuitOpen,
//! UnsupportedBody, InvalidUrl, InvalidHeader,
//! DeadlineExceeded, Build                      → surfaced immediately
//! Timeout, Transport (network-level)           → retried up to max_retries
//! Transport (protocol-level)                   → surfaced immediately
//! ```

use std::time::Duration;
use thiserror::Error;

pub use crate::auth::AuthError;
pub use crate::http::transport::TransportError;

/// Why a circuit breaker refused to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The breaker is open (or half-open with its probe already in flight).
    Open,
    /// `max_concurrent_requests` calls are already running.
    MaxConcurrency,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Open => write!(f, "circuit open"),
            Rejection::MaxConcurrency => write!(f, "max concurrency reached"),
        }
    }
}

/// Errors returned by [`Client`](crate::Client) calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Token acquisition failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The client names a circuit breaker that was never registered.
    #[error("circuit breaker config not found: {0}")]
    ConfigNotFound(String),

    /// The named circuit breaker refused the call.
    #[error("circuit breaker '{name}' rejected the call: {reason}")]
    CircuitOpen { name: String, reason: Rejection },

    /// The call exceeded the breaker or client timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed to complete the exchange.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request body cannot be encoded for the configured content type.
    #[error("unsupported request body: {0}")]
    UnsupportedBody(String),

    /// The target URL could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A header name or value is not valid HTTP.
    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    /// The caller-supplied deadline elapsed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The underlying transport could not be built.
    #[error("failed to build client: {0}")]
    Build(String),
}

impl Error {
    /// Whether the pipeline may attempt the call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Transport(e) => e.is_network(),
            _ => false,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(Error::Timeout(Duration::from_millis(200)).is_retryable());
        assert!(Error::Transport(TransportError::Connect("refused".into())).is_retryable());
        assert!(!Error::Transport(TransportError::Protocol("bad chunk".into())).is_retryable());
        assert!(!Error::ConfigNotFound("orders".into()).is_retryable());
        assert!(!Error::CircuitOpen {
            name: "orders".into(),
            reason: Rejection::Open
        }
        .is_retryable());
        assert!(!Error::UnsupportedBody("xml".into()).is_retryable());
        assert!(!Error::Auth(AuthError::Endpoint { status: 500, body: String::new() }).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::ConfigNotFound("hystrixConfigTimeout".into());
        assert_eq!(
            err.to_string(),
            "circuit breaker config not found: hystrixConfigTimeout"
        );

        let err = Error::CircuitOpen {
            name: "orders".into(),
            reason: Rejection::MaxConcurrency,
        };
        assert!(err.to_string().contains("max concurrency"));
    }
}
