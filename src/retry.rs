//! Retry-then-give-up for oracle calls, as an explicit state machine.
//!
//! A [`RetryState`] is created per page. After each failed call the pipeline
//! feeds the error to [`RetryState::on_failure`] and acts on the returned
//! [`RetryDecision`]:
//!
//! ```text
//!            transient, attempts left
//!   Trying ───────────────────────────▶ RetryAfter(delay) ──▶ Trying
//!     │
//!     ├── permanent error ──────────▶ GiveUp
//!     └── transient, none left ─────▶ Exhausted
//! ```
//!
//! Delays grow exponentially from `base_delay`, capped at `max_delay`, with a
//! small deterministic jitter so concurrent files do not retry in lock-step.

use crate::config::RotateConfig;
use crate::error::OracleError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RotateConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms.max(config.retry_backoff_ms)),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep this long, then try again.
    RetryAfter(Duration),
    /// The error is permanent; retrying cannot help.
    GiveUp,
    /// The error was transient but the retry budget is spent.
    Exhausted,
}

/// Per-page retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Calls made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record the start of an attempt.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Decide what follows a failed attempt.
    pub fn on_failure(&self, err: &OracleError) -> RetryDecision {
        if !err.is_transient() {
            info!("permanent oracle error, not retrying: {}", err);
            return RetryDecision::GiveUp;
        }

        let retries_done = self.attempts.saturating_sub(1);
        if retries_done >= self.policy.max_retries {
            warn!(
                attempts = self.attempts,
                max_retries = self.policy.max_retries,
                "retry limit exhausted"
            );
            return RetryDecision::Exhausted;
        }

        let delay = compute_delay(retries_done, &self.policy);
        debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        RetryDecision::RetryAfter(delay)
    }
}

/// delay = min(base * 2^retry + jitter, max_delay), jitter in [0, base / 4).
fn compute_delay(retry: u32, policy: &RetryPolicy) -> Duration {
    let base_ms = policy.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << retry.min(16));
    let total_ms = exp_ms.saturating_add(jitter(base_ms / 4, retry));
    Duration::from_millis(total_ms.min(policy.max_delay.as_millis() as u64))
}

fn jitter(span_ms: u64, retry: u32) -> u64 {
    if span_ms == 0 {
        return 0;
    }
    (u64::from(retry) + 1).wrapping_mul(6364136223846793005) % span_ms
}
