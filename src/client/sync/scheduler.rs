//! # Sync Scheduler
//!
//! Decides when the sync runtime drains again on its own after a drain
//! left retry-eligible operations behind.
//!
//! ## Features
//!
//! - **Backoff**: consecutive failing drains push the next one further out
//! - **Reset**: a clean drain, or going offline, clears the schedule

use crate::client::offline::retry::BackoffStrategy;
use crate::shared::event::DrainReport;
use std::time::Duration;
use tokio::time::Instant;

/// Follow-up drain scheduler
#[derive(Debug)]
pub struct SyncScheduler {
    backoff: BackoffStrategy,
    consecutive_failures: u32,
    next_drain_at: Option<Instant>,
}

impl SyncScheduler {
    pub fn new(backoff: BackoffStrategy) -> Self {
        Self {
            backoff,
            consecutive_failures: 0,
            next_drain_at: None,
        }
    }

    /// Account for a finished drain
    ///
    /// `retry_eligible` is whether pending operations remain in the store.
    /// Returns the delay before the follow-up drain, if one is scheduled.
    pub fn record_drain(&mut self, report: &DrainReport, retry_eligible: bool) -> Option<Duration> {
        if report.is_clean() || !retry_eligible {
            self.reset();
            return None;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.backoff.delay(self.consecutive_failures)?;
        self.next_drain_at = Some(Instant::now() + delay);
        tracing::debug!(
            failures = self.consecutive_failures,
            delay_ms = delay.as_millis() as u64,
            "scheduled follow-up drain"
        );
        Some(delay)
    }

    /// Forget any scheduled follow-up
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.next_drain_at = None;
    }

    /// Deadline of the scheduled follow-up drain
    pub fn next_drain_at(&self) -> Option<Instant> {
        self.next_drain_at
    }

    /// Mark the scheduled drain as started
    pub fn take_due(&mut self) -> bool {
        match self.next_drain_at {
            Some(at) if at <= Instant::now() => {
                self.next_drain_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Time until the scheduled drain
    pub fn time_until_next_drain(&self) -> Option<Duration> {
        self.next_drain_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}
