//! # Retry Policy and Backoff Strategies
//!
//! Decides when a failed operation gives up and how long the sync runtime
//! waits before draining again after a drain that left failures behind.
//!
//! ## Features
//!
//! - **Attempt ceiling**: operations are marked failed after `max_attempts`
//! - **Exponential Backoff**: gradually increase the delay between drains
//! - **Jitter**: add randomness to prevent thundering herd
//! - **Permanent rejections**: optionally give up at once on 4xx responses

use std::time::Duration;

/// Attempts before an operation is marked failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// No automatic re-drain; only connectivity changes and manual syncs drain
    None,
    /// Fixed interval between drains
    Fixed {
        /// Interval between drains
        interval: Duration,
    },
    /// Exponential backoff with jitter
    Exponential {
        /// Delay after the first failed drain
        base: Duration,
        /// Upper bound
        max: Duration,
        /// Jitter factor (0.0 to 1.0)
        jitter: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: Duration::from_secs(5),
            max: Duration::from_secs(300),
            jitter: 0.1,
        }
    }
}

impl BackoffStrategy {
    /// Delay before the next drain after `consecutive_failures` failing drains
    ///
    /// Returns `None` when nothing should be scheduled.
    pub fn delay(&self, consecutive_failures: u32) -> Option<Duration> {
        if consecutive_failures == 0 {
            return None;
        }
        match self {
            BackoffStrategy::None => None,
            BackoffStrategy::Fixed { interval } => Some(*interval),
            BackoffStrategy::Exponential { base, max, jitter } => {
                let exponent = consecutive_failures.saturating_sub(1).min(16);
                let delay = base.saturating_mul(2u32.pow(exponent)).min(*max);

                let jitter = jitter.clamp(0.0, 1.0);
                if jitter == 0.0 {
                    return Some(delay);
                }
                let spread = delay.as_secs_f64() * jitter * rand::random::<f64>();
                Some(delay + Duration::from_secs_f64(spread))
            }
        }
    }
}

/// Give-up policy for queued operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempt ceiling
    pub max_attempts: u32,
    /// Delay between automatic drains
    pub backoff: BackoffStrategy,
    /// Mark an operation failed on the first permanent rejection
    pub give_up_on_permanent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffStrategy::default(),
            give_up_on_permanent: false,
        }
    }
}

impl RetryPolicy {
    /// Whether an operation with `attempts` resolved attempts has given up
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
