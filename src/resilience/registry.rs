//! Named circuit breaker registry.
//!
//! # Responsibilities
//! - Register breaker configurations by command name
//! - Look a breaker up at call time and run the call under it
//! - Fail fast for names that were never registered
//!
//! # Design Decisions
//! - An explicit value shared via `Arc`, not a process global
//! - Re-registration replaces the breaker (last write wins); calls already
//!   admitted finish on the instance that admitted them
//! - The map entry is cloned out before awaiting, so no shard lock is held
//!   across a network call

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};

/// Process-wide mapping from command name to circuit breaker.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    commands: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the breaker for `name`.
    pub fn configure_command(&self, name: impl Into<String>, config: CircuitBreakerConfig) {
        let name = name.into();
        tracing::info!(
            breaker = %name,
            timeout_ms = config.timeout.as_millis() as u64,
            sleep_window_ms = config.sleep_window.as_millis() as u64,
            request_volume_threshold = config.request_volume_threshold,
            max_concurrent_requests = config.max_concurrent_requests,
            "Circuit breaker configured"
        );
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), config));
        self.commands.insert(name, breaker);
    }

    /// Remove the breaker for `name`, returning whether it existed.
    pub fn remove_command(&self, name: &str) -> bool {
        self.commands.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.commands.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.get(name).map(|breaker| breaker.state())
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Run `f` under the breaker registered as `name`.
    ///
    /// `f` is never called when `name` is unknown.
    pub async fn execute<F, Fut, T, E>(&self, name: &str, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(breaker) = self.get(name) else {
            tracing::warn!(breaker = %name, "Circuit breaker config not found");
            return Err(BreakerError::NotFound(name.to_string()));
        };
        breaker.execute(f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_unknown_name_fails_fast() {
        let registry = BreakerRegistry::new();
        let calls = AtomicU32::new(0);

        let result = registry
            .execute("missing", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &'static str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::NotFound(ref n)) if n == "missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execute_under_registered_breaker() {
        let registry = BreakerRegistry::new();
        registry.configure_command("orders", CircuitBreakerConfig::default());

        let value = registry
            .execute("orders", || async { Ok::<_, &'static str>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(registry.state("orders"), Some(CircuitState::Closed));
    }

    #[test]
    fn test_reconfigure_last_write_wins() {
        let registry = BreakerRegistry::new();
        registry.configure_command("orders", CircuitBreakerConfig::default());
        registry.configure_command(
            "orders",
            CircuitBreakerConfig::new(Duration::from_millis(200), Duration::from_secs(2), 50, 100),
        );

        let breaker = registry.get("orders").unwrap();
        assert_eq!(breaker.config().timeout, Duration::from_millis(200));
        assert_eq!(breaker.config().max_concurrent_requests, 100);
        assert_eq!(registry.names(), vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_registration_and_use() {
        let registry = Arc::new(BreakerRegistry::new());
        registry.configure_command("shared", CircuitBreakerConfig::default());

        let mut tasks = Vec::new();
        for i in 0..8u32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    registry.configure_command(
                        "shared",
                        CircuitBreakerConfig {
                            request_volume_threshold: i + 1,
                            ..CircuitBreakerConfig::default()
                        },
                    );
                    Ok(())
                } else {
                    registry
                        .execute("shared", || async { Ok::<(), &'static str>(()) })
                        .await
                        .map_err(|e| e.to_string())
                }
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert!(registry.contains("shared"));
        assert!(registry.remove_command("shared"));
        assert!(!registry.contains("shared"));
    }
}
