//! Token cache with single-flight refresh.
//!
//! # Responsibilities
//! - Hand out the cached token while it is fresh, with no network access
//! - Run at most one refresh at a time and share its result with every waiter
//! - Drop a token the server rejected, unless it was already replaced
//!
//! # Concurrency
//! ```text
//! get_token ──fresh cached──▶ return (lock-free read)
//!     │
//!     ▼ lock in_flight slot (short, never held across .await)
//! re-check cache ──fresh──▶ return
//!     │
//!     ├─ refresh in flight ──▶ clone shared future, await it
//!     └─ none ──▶ spawn refresh task, store shared future, await it
//!
//! refresh task: fetch → store token (success only) → clear slot
//! ```
//!
//! The refresh runs on its own task, so a waiter that is cancelled cannot
//! abort it; the remaining waiters still get its result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::auth::{AuthError, Token, TokenSource};
use crate::observability::metrics;

type Refresh = Shared<BoxFuture<'static, Result<Arc<Token>, AuthError>>>;

struct Inner {
    source: Arc<dyn TokenSource>,
    cached: ArcSwapOption<Token>,
    in_flight: Mutex<Option<Refresh>>,
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, Option<Refresh>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_cached(&self) -> Option<Arc<Token>> {
        self.cached.load_full().filter(|token| token.is_fresh())
    }
}

/// Clears the in-flight slot when the refresh task ends, even by panic.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.inner.in_flight() = None;
    }
}

/// Shared, cloneable handle to one token cache.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cached: ArcSwapOption::empty(),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Return a fresh token, refreshing it if needed.
    pub async fn get_token(&self) -> Result<Arc<Token>, AuthError> {
        if let Some(token) = self.inner.fresh_cached() {
            return Ok(token);
        }

        let refresh = {
            let mut slot = self.inner.in_flight();
            if let Some(token) = self.inner.fresh_cached() {
                return Ok(token);
            }
            match slot.as_ref() {
                Some(refresh) => refresh.clone(),
                None => {
                    let refresh = Self::spawn_refresh(Arc::clone(&self.inner));
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// The cached token, fresh or not.
    pub fn cached(&self) -> Option<Arc<Token>> {
        self.inner.cached.load_full()
    }

    /// Drop `stale` from the cache if it is still the cached token.
    pub fn invalidate(&self, stale: &Token) {
        let previous = self.inner.cached.rcu(|current| match current {
            Some(token) if token.authorization() == stale.authorization() => None,
            other => other.clone(),
        });
        if previous.is_some_and(|token| token.authorization() == stale.authorization()) {
            tracing::debug!("Cached token invalidated");
        }
    }

    /// Drop whatever token is cached.
    pub fn reset(&self) {
        self.inner.cached.store(None);
    }

    fn spawn_refresh(inner: Arc<Inner>) -> Refresh {
        tracing::debug!("Refreshing token");
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
            };
            let result = inner.source.fetch_token().await.map(Arc::new);
            match &result {
                Ok(token) => {
                    inner.cached.store(Some(Arc::clone(token)));
                    metrics::record_token_refresh(true);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Token refresh failed");
                    metrics::record_token_refresh(false);
                }
            }
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(AuthError::Aborted(e.to_string())))
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("cached", &self.inner.cached.load().is_some())
            .finish_non_exhaustive()
    }
}
