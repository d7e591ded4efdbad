//! Authentication token.

use std::time::{Duration, Instant};

/// Longest lifetime a token is trusted for, whatever the issuer says.
pub const MAX_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// An issued token. Never mutated; a refresh produces a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Complete `Authorization` header value, e.g. `Bearer abc`.
    authorization: String,
    /// When the issuer considers the token expired.
    expires_at: Instant,
    /// When the manager stops handing it out.
    refresh_at: Instant,
}

impl Token {
    /// Build a token received at `issued_at` and valid for `lifetime`.
    ///
    /// The token is refreshed `margin` before it expires, but never earlier
    /// than half way through its lifetime. Lifetimes above [`MAX_LIFETIME`]
    /// are clamped.
    pub fn new(
        authorization: impl Into<String>,
        issued_at: Instant,
        lifetime: Duration,
        margin: Duration,
    ) -> Self {
        let lifetime = lifetime.min(MAX_LIFETIME);
        let margin = margin.min(lifetime / 2);
        let expires_at = issued_at.checked_add(lifetime).unwrap_or(issued_at);
        Self {
            authorization: authorization.into(),
            expires_at,
            refresh_at: expires_at.checked_sub(margin).unwrap_or(issued_at),
        }
    }

    /// Token valid for `lifetime` from now.
    pub fn issued_now(authorization: impl Into<String>, lifetime: Duration, margin: Duration) -> Self {
        Self::new(authorization, Instant::now(), lifetime, margin)
    }

    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Whether the token may still be used for a new request.
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}
