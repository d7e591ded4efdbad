//! Retry logic.
//!
//! # Responsibilities
//! - Decide which response statuses are transient
//! - Drive a single call through its attempts as an explicit state machine
//!
//! # State Machine
//! ```text
//! Attempting(n) ──success / non-retryable──▶ Success | Failed
//!      │
//!      │ retryable and n < max_retries
//!      ▼
//! WaitingBackoff(n, delay) ──sleep──▶ Attempting(n + 1)
//!
//! Attempting(n) ──retryable and n == max_retries──▶ Failed
//! ```
//!
//! # Design Decisions
//! - The plan knows nothing about transports or breakers; the pipeline
//!   classifies each attempt into a [`Verdict`] and feeds it back
//! - Every method is retried; the breaker bounds the damage instead
//! - `max_retries = R` means at most `R + 1` attempts

use std::time::Duration;

use crate::resilience::backoff::Backoff;

/// Statuses retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Whether `status` is in the retryable set.
pub fn is_retryable_status(status: u16, retryable: &[u16]) -> bool {
    retryable.contains(&status)
}

/// Classification of one attempt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    Retryable,
    Fatal,
}

/// Where a call currently is in its attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// Attempt number `attempt` (0-based) is about to run.
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed transiently; sleep `delay` then try again.
    WaitingBackoff { attempt: u32, delay: Duration },
    Success,
    Failed,
}

impl RetryPhase {
    /// Whether the call has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryPhase::Success | RetryPhase::Failed)
    }
}

/// Retry budget and backoff policy of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    max_retries: u32,
    backoff: Backoff,
}

impl RetryPlan {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self { max_retries, backoff }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Initial phase of every call.
    pub fn start(&self) -> RetryPhase {
        RetryPhase::Attempting { attempt: 0 }
    }

    /// Transition out of `Attempting { attempt }` given the attempt's verdict.
    pub fn after_attempt(&self, attempt: u32, verdict: Verdict) -> RetryPhase {
        match verdict {
            Verdict::Succeeded => RetryPhase::Success,
            Verdict::Fatal => RetryPhase::Failed,
            Verdict::Retryable if attempt < self.max_retries => RetryPhase::WaitingBackoff {
                attempt,
                delay: self.backoff.next_delay(attempt),
            },
            Verdict::Retryable => RetryPhase::Failed,
        }
    }

    /// Transition out of `WaitingBackoff { attempt, .. }` once the sleep is over.
    pub fn after_backoff(&self, attempt: u32) -> RetryPhase {
        RetryPhase::Attempting {
            attempt: attempt.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(plan: &RetryPlan, mut verdicts: impl FnMut(u32) -> Verdict) -> (RetryPhase, u32, Vec<Duration>) {
        let mut phase = plan.start();
        let mut attempts = 0;
        let mut sleeps = Vec::new();
        while !phase.is_terminal() {
            phase = match phase {
                RetryPhase::Attempting { attempt } => {
                    attempts += 1;
                    plan.after_attempt(attempt, verdicts(attempt))
                }
                RetryPhase::WaitingBackoff { attempt, delay } => {
                    sleeps.push(delay);
                    plan.after_backoff(attempt)
                }
                terminal => terminal,
            };
        }
        (phase, attempts, sleeps)
    }

    #[test]
    fn test_always_retryable_makes_r_plus_one_attempts() {
        let plan = RetryPlan::new(3, Backoff::Constant(Duration::from_millis(50)));
        let (phase, attempts, sleeps) = run(&plan, |_| Verdict::Retryable);
        assert_eq!(phase, RetryPhase::Failed);
        assert_eq!(attempts, 4);
        assert_eq!(sleeps, vec![Duration::from_millis(50); 3]);
    }

    #[test]
    fn test_backoff_receives_zero_based_retry_number() {
        let plan = RetryPlan::new(
            3,
            Backoff::Exponential {
                base: Duration::from_millis(10),
                max: Duration::from_secs(1),
            },
        );
        let (_, _, sleeps) = run(&plan, |_| Verdict::Retryable);
        assert_eq!(
            sleeps,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40)
            ]
        );
    }

    #[test]
    fn test_success_after_transient_failures() {
        let plan = RetryPlan::new(5, Backoff::default());
        let (phase, attempts, sleeps) = run(&plan, |attempt| {
            if attempt < 2 {
                Verdict::Retryable
            } else {
                Verdict::Succeeded
            }
        });
        assert_eq!(phase, RetryPhase::Success);
        assert_eq!(attempts, 3);
        assert_eq!(sleeps.len(), 2);
    }

    #[test]
    fn test_fatal_stops_immediately() {
        let plan = RetryPlan::new(5, Backoff::default());
        let (phase, attempts, sleeps) = run(&plan, |attempt| {
            if attempt == 0 {
                Verdict::Retryable
            } else {
                Verdict::Fatal
            }
        });
        assert_eq!(phase, RetryPhase::Failed);
        assert_eq!(attempts, 2);
        assert_eq!(sleeps.len(), 1);
    }

    #[test]
    fn test_zero_retries() {
        let plan = RetryPlan::new(0, Backoff::default());
        let (phase, attempts, _) = run(&plan, |_| Verdict::Retryable);
        assert_eq!(phase, RetryPhase::Failed);
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_retryable_statuses() {
        for status in DEFAULT_RETRYABLE_STATUSES {
            assert!(is_retryable_status(status, &DEFAULT_RETRYABLE_STATUSES));
        }
        for status in [200, 201, 400, 401, 404, 501, 505] {
            assert!(!is_retryable_status(status, &DEFAULT_RETRYABLE_STATUSES));
        }
    }
}
