//! # Sync Metrics
//!
//! Counters kept by the sync engine across drains.

use crate::shared::event::DrainReport;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    pub total_drains: u64,
    pub skipped_drains: u64,
    pub items_delivered: u64,
    pub failed_attempts: u64,
    pub average_drain_duration: Duration,
    pub last_drain_duration: Option<Duration>,
    last_drain_start: Option<Instant>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drain_start(&mut self) {
        self.last_drain_start = Some(Instant::now());
    }

    pub fn record_drain_complete(&mut self, report: &DrainReport) {
        self.total_drains += 1;
        self.items_delivered += report.success_count as u64;
        self.failed_attempts += report.error_count as u64;

        if let Some(start) = self.last_drain_start.take() {
            let duration = start.elapsed();
            self.last_drain_duration = Some(duration);

            // Rolling average
            let previous = u32::try_from(self.total_drains - 1).unwrap_or(u32::MAX);
            let total = self.average_drain_duration.saturating_mul(previous) + duration;
            self.average_drain_duration = total / previous.saturating_add(1);
        }
    }

    pub fn record_drain_skipped(&mut self) {
        self.skipped_drains += 1;
    }

    /// Share of attempts that delivered
    pub fn success_rate(&self) -> f64 {
        let attempts = self.items_delivered + self.failed_attempts;
        if attempts == 0 {
            0.0
        } else {
            self.items_delivered as f64 / attempts as f64
        }
    }
}
