//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: one probe request is testing if the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: requests >= request_volume_threshold
//!                and error % >= error_percent_threshold within rolling window
//! Open → Half-Open: sleep_window elapsed, next request becomes the probe
//! Half-Open → Closed: probe succeeds (window is reset)
//! Half-Open → Open: probe fails, another sleep_window starts
//! ```
//!
//! # Design Decisions
//! - Per-name circuit breaker (see `registry.rs`), not global
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe per sleep window (prevents hammering recovering backend)
//! - Concurrency limit is checked before the state and is not a failure
//! - Timed-out calls are dropped, which aborts the in-flight request

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::error::Rejection;
use crate::observability::metrics;

/// Breaker parameters registered under a command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Maximum duration of one call before it is aborted and counted as a failure.
    pub timeout: Duration,
    /// How long the breaker stays open before admitting a probe.
    pub sleep_window: Duration,
    /// Minimum requests in the rolling window before the breaker may trip.
    pub request_volume_threshold: u32,
    /// Calls allowed in flight at once; extra calls are rejected.
    pub max_concurrent_requests: usize,
    /// Error percentage (0-100) at or above which the breaker trips.
    pub error_percent_threshold: u8,
    /// Length of the statistics window (one-second buckets).
    pub rolling_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            sleep_window: Duration::from_secs(5),
            request_volume_threshold: 20,
            max_concurrent_requests: 10,
            error_percent_threshold: 50,
            rolling_window: Duration::from_secs(10),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(
        timeout: Duration,
        sleep_window: Duration,
        request_volume_threshold: u32,
        max_concurrent_requests: usize,
    ) -> Self {
        Self {
            timeout,
            sleep_window,
            request_volume_threshold,
            max_concurrent_requests,
            ..Self::default()
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Failure of a call executed under a breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// No breaker is registered under this name.
    #[error("circuit breaker config not found: {0}")]
    NotFound(String),

    /// The breaker refused to run the call.
    #[error("circuit breaker '{name}' rejected the call: {reason}")]
    Rejected { name: String, reason: Rejection },

    /// The call ran longer than the breaker timeout.
    #[error("circuit breaker '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The call itself failed.
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    second: u64,
    successes: u32,
    failures: u32,
}

/// Success/failure counts over the last `span` seconds.
#[derive(Debug)]
struct RollingWindow {
    origin: Instant,
    span: u64,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    fn new(span: Duration) -> Self {
        Self {
            origin: Instant::now(),
            span: span.as_secs().max(1),
            buckets: VecDeque::new(),
        }
    }

    fn second(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_secs()
    }

    fn evict(&mut self, second: u64) {
        while let Some(front) = self.buckets.front() {
            if front.second + self.span <= second {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant, success: bool) {
        let second = self.second(now);
        self.evict(second);
        if self.buckets.back().map_or(true, |b| b.second != second) {
            self.buckets.push_back(Bucket {
                second,
                successes: 0,
                failures: 0,
            });
        }
        if let Some(bucket) = self.buckets.back_mut() {
            if success {
                bucket.successes = bucket.successes.saturating_add(1);
            } else {
                bucket.failures = bucket.failures.saturating_add(1);
            }
        }
    }

    /// Returns `(total, failures)` still inside the window.
    fn totals(&mut self, now: Instant) -> (u64, u64) {
        let second = self.second(now);
        self.evict(second);
        self.buckets.iter().fold((0, 0), |(total, failures), b| {
            (
                total + u64::from(b.successes) + u64::from(b.failures),
                failures + u64::from(b.failures),
            )
        })
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }
}

#[derive(Debug)]
struct Circuit {
    open: bool,
    probing: bool,
    opened_or_last_tested: Option<Instant>,
    window: RollingWindow,
}

/// A single named circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    permits: Semaphore,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrent_requests.min(Semaphore::MAX_PERMITS));
        Self {
            name: name.into(),
            circuit: Mutex::new(Circuit {
                open: false,
                probing: false,
                opened_or_last_tested: None,
                window: RollingWindow::new(config.rolling_window),
            }),
            config,
            permits,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        let circuit = self.circuit();
        match (circuit.open, circuit.probing) {
            (false, _) => CircuitState::Closed,
            (true, false) => CircuitState::Open,
            (true, true) => CircuitState::HalfOpen,
        }
    }

    /// Run `f` under this breaker's admission control and timeout.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Ok(_permit) = self.permits.try_acquire() else {
            return Err(self.reject(Rejection::MaxConcurrency));
        };
        if let Err(reason) = self.admit() {
            return Err(self.reject(reason));
        }

        match tokio::time::timeout(self.config.timeout, f()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
            Err(_) => {
                tracing::warn!(
                    breaker = %self.name,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Call exceeded breaker timeout"
                );
                metrics::record_breaker_timeout(&self.name);
                self.record_failure();
                Err(BreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    fn circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject<E>(&self, reason: Rejection) -> BreakerError<E> {
        tracing::debug!(breaker = %self.name, reason = %reason, "Call rejected");
        metrics::record_breaker_rejection(&self.name, reason);
        BreakerError::Rejected {
            name: self.name.clone(),
            reason,
        }
    }

    fn admit(&self) -> Result<(), Rejection> {
        let mut circuit = self.circuit();
        if !circuit.open {
            return Ok(());
        }

        let now = Instant::now();
        match circuit.opened_or_last_tested {
            Some(since) if now.saturating_duration_since(since) >= self.config.sleep_window => {
                circuit.opened_or_last_tested = Some(now);
                circuit.probing = true;
                tracing::info!(breaker = %self.name, "Sleep window elapsed, admitting probe");
                Ok(())
            }
            _ => Err(Rejection::Open),
        }
    }

    fn record_success(&self) {
        let mut circuit = self.circuit();
        if circuit.open {
            circuit.open = false;
            circuit.probing = false;
            circuit.opened_or_last_tested = None;
            circuit.window.reset();
            tracing::info!(breaker = %self.name, "Circuit closed");
            metrics::record_breaker_state(&self.name, false);
        }
        circuit.window.record(Instant::now(), true);
    }

    fn record_failure(&self) {
        let now = Instant::now();
        let mut circuit = self.circuit();
        circuit.window.record(now, false);

        if circuit.open {
            // Failed probe: stay open until the next sleep window elapses.
            circuit.probing = false;
            return;
        }

        let (total, failures) = circuit.window.totals(now);
        if total < u64::from(self.config.request_volume_threshold) {
            return;
        }
        if failures * 100 >= total * u64::from(self.config.error_percent_threshold) {
            circuit.open = true;
            circuit.opened_or_last_tested = Some(now);
            tracing::warn!(
                breaker = %self.name,
                requests = total,
                failures,
                sleep_window_ms = self.config.sleep_window.as_millis() as u64,
                "Error threshold exceeded, circuit opened"
            );
            metrics::record_breaker_state(&self.name, true);
        }
    }
}
