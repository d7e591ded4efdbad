//! Resilient HTTP client library.
//!
//! Calls carry a cached bearer token, run under a named circuit breaker and
//! are retried with backoff on transient failures.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use galf::{BreakerRegistry, CircuitBreakerConfig, Client, ClientOptions, RequestOptions};
//!
//! # async fn run() -> galf::Result<()> {
//! let registry = Arc::new(BreakerRegistry::new());
//! registry.configure_command(
//!     "orders",
//!     CircuitBreakerConfig::new(Duration::from_secs(1), Duration::from_secs(5), 20, 10),
//! );
//!
//! let client = Client::builder(ClientOptions {
//!     circuit_breaker: Some("orders".to_string()),
//!     ..ClientOptions::default()
//! })
//! .registry(registry)
//! .build()?;
//!
//! let mut options = RequestOptions::new();
//! options.add_header("token", "1234567890");
//! let response = client.get("http://orders.internal/v1/orders", Some(&options)).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod resilience;

pub use auth::{AuthError, OAuthTokenSource, Token, TokenManager, TokenSource};
pub use config::GalfConfig;
pub use error::{Error, Rejection, Result};
pub use http::{
    Body, Client, ClientBuilder, ClientOptions, RequestOptions, Response, Transport, TransportError,
    TransportRequest,
};
pub use resilience::{Backoff, BreakerRegistry, CircuitBreakerConfig, CircuitState};
