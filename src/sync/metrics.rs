//! # Sync Metrics
//!
//! Running totals across sync passes.

use super::sync_state::SyncReport;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMetrics {
    /// Passes that ran (skipped passes are counted separately)
    pub total_passes: u64,
    pub skipped_passes: u64,
    pub delivered: u64,
    pub failed_deliveries: u64,
    pub average_pass_duration: Duration,
    pub last_pass_duration: Option<Duration>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, report: &SyncReport, duration: Duration) {
        if report.was_skipped() {
            self.skipped_passes += 1;
            return;
        }

        self.total_passes += 1;
        self.delivered += report.synced as u64;
        self.failed_deliveries += report.failed as u64;
        self.last_pass_duration = Some(duration);

        // Update rolling average
        let previous = self.average_pass_duration * (self.total_passes - 1) as u32;
        self.average_pass_duration = (previous + duration) / self.total_passes as u32;
    }

    /// Share of attempted deliveries that succeeded.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.delivered + self.failed_deliveries;
        if attempted == 0 {
            0.0
        } else {
            self.delivered as f64 / attempted as f64
        }
    }
}
