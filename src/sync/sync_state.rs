//! # Sync State Management
//!
//! Pass reports, per-plan status counts and the engine's last-known state.

use super::network_monitor::NetworkStatus;
use crate::tracking::{ExerciseTracking, RecordState};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Why a pass did no work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass was still running
    AlreadyRunning,
    /// Monitor reported no connectivity
    Offline,
}

/// A record whose delivery failed during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub id: Uuid,
    pub plan_id: String,
    pub completion_key: String,
    pub error: String,
}

/// Outcome of one `force_complete_sync` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    /// Plans that had at least one unsynced record
    pub plans: usize,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub failures: Vec<DeliveryFailure>,
    pub skipped: Option<SkipReason>,
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            plans: 0,
            attempted: 0,
            synced: 0,
            failed: 0,
            failures: Vec::new(),
            skipped: None,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(Utc::now())
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// Fold one plan's results into the pass total.
    pub(crate) fn absorb(&mut self, plan: PlanOutcome) {
        self.plans += 1;
        self.attempted += plan.synced + plan.failures.len();
        self.synced += plan.synced;
        self.failed += plan.failures.len();
        self.failures.extend(plan.failures);
    }
}

/// Results of delivering one plan's records
#[derive(Debug, Default)]
pub(crate) struct PlanOutcome {
    pub(crate) synced: usize,
    pub(crate) failures: Vec<DeliveryFailure>,
}

/// Record counts by sync state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub synced: usize,
    pub failed: usize,
    pub pending: usize,
    /// Records with a delivery in flight right now
    pub syncing: usize,
}

impl SyncStatus {
    /// Count `records`, treating ids in `in_flight` as syncing.
    pub fn tally<'a>(
        records: impl IntoIterator<Item = &'a ExerciseTracking>,
        in_flight: &HashSet<Uuid>,
    ) -> Self {
        let mut status = Self::default();
        for record in records {
            match record_state(record, in_flight) {
                RecordState::Synced => status.synced += 1,
                RecordState::Failed => status.failed += 1,
                RecordState::Pending => status.pending += 1,
                RecordState::Syncing => status.syncing += 1,
            }
        }
        status
    }

    pub fn total(&self) -> usize {
        self.synced + self.failed + self.pending + self.syncing
    }

    /// Nothing left to deliver.
    pub fn is_settled(&self) -> bool {
        self.failed == 0 && self.pending == 0 && self.syncing == 0
    }

    pub(crate) fn add(&mut self, other: SyncStatus) {
        self.synced += other.synced;
        self.failed += other.failed;
        self.pending += other.pending;
        self.syncing += other.syncing;
    }
}

/// Stored state, overridden by `Syncing` while a delivery is in flight.
pub fn record_state(record: &ExerciseTracking, in_flight: &HashSet<Uuid>) -> RecordState {
    if in_flight.contains(&record.id) {
        RecordState::Syncing
    } else {
        record.state()
    }
}

/// Snapshot of the engine
#[derive(Debug, Clone)]
pub struct SyncState {
    pub is_syncing: bool,
    /// End of the last pass that actually ran
    pub last_sync: Option<DateTime<Utc>>,
    pub network_status: NetworkStatus,
    pub last_report: Option<SyncReport>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            is_syncing: false,
            last_sync: None,
            network_status: NetworkStatus::Offline,
            last_report: None,
        }
    }
}
