//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt of a call:
//!     → registry.rs (look up the named breaker, fail fast if unknown)
//!     → circuit_breaker.rs (admission, concurrency limit, timeout, health tracking)
//!     → On transient failure: retries.rs (next phase), backoff.rs (how long to wait)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every breaker call has a deadline
//! - Every retry is a fresh admission check against the breaker
//! - Circuit breaker prevents cascading failures
//! - Retry and backoff are pure and testable without a transport

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;
pub mod retries;

pub use backoff::Backoff;
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use registry::BreakerRegistry;
pub use retries::{RetryPhase, RetryPlan, Verdict};
