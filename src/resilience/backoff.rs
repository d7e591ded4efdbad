//! Backoff strategies between retry attempts.
//!
//! Attempt numbering starts at 0 for the first retry. All arithmetic
//! saturates, so no strategy can overflow or go negative.

use std::time::Duration;

/// Default delay of the constant strategy.
pub const DEFAULT_BACKOFF_DELAY: Duration = Duration::from_millis(100);

/// Delay policy applied between two attempts of the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant(Duration),
    /// `base * (attempt + 1)`, capped at `max`.
    Linear { base: Duration, max: Duration },
    /// `base * 2^attempt`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Constant(DEFAULT_BACKOFF_DELAY)
    }
}

impl Backoff {
    /// Delay to wait before retry number `attempt` (0-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Constant(delay) => delay,
            Backoff::Linear { base, max } => base.saturating_mul(attempt.saturating_add(1)).min(max),
            Backoff::Exponential { base, max } => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}
