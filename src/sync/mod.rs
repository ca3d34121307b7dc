//! # Sync Engine
//!
//! Records exercise completions offline and delivers them to the server when
//! asked.
//!
//! ## Architecture
//!
//! The engine coordinates:
//! - **Local Store**: every completion is persisted before anything else
//! - **Key Generator**: completions are addressed by a deterministic key, so
//!   repeated recordings of one exercise collapse into one record
//! - **Transport**: one `POST` per unsynced record, upserted by key on the server
//! - **Network Monitor**: a pass is skipped while offline
//! - **Sync State / Metrics**: last report and running totals
//!
//! A record goes `Unsynced -> Syncing -> Synced | Unsynced(error)`. Passes are
//! caller driven: there is no internal timer, failed records are simply picked
//! up by the next [`SyncEngine::force_complete_sync`]. Within a plan records
//! are delivered in order; plans run concurrently up to
//! [`SyncConfig::max_concurrent_plans`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trainlog::shared::config::AppConfig;
//! use trainlog::sync::{CompletionRequest, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::open(&AppConfig::load(None)?).await?;
//!
//! engine
//!     .record_completion(CompletionRequest::new("plan-1", "week-2-day-1", "Max Hangs"))
//!     .await?;
//!
//! let report = engine.force_complete_sync().await;
//! println!("synced {} / failed {}", report.synced, report.failed);
//! # Ok(())
//! # }
//! ```

pub mod metrics;
pub mod network_monitor;
pub mod sync_state;
pub mod transport;

pub use metrics::SyncMetrics;
pub use network_monitor::{NetworkMonitor, NetworkStatus};
pub use sync_state::{DeliveryFailure, SkipReason, SyncReport, SyncState, SyncStatus};
pub use transport::{HttpTransport, RemoteTransport};

use crate::library::ExerciseLibrary;
use crate::local_db::{DatabaseStats, DeliveryOutcome, LocalStore, PruneStats};
use crate::resolver::{Resolution, Resolver};
use crate::shared::config::AppConfig;
use crate::shared::error::{SetupError, StoreError, TransportError};
use crate::tracking::{CompletionKey, CompletionKeyGenerator, ExerciseTracking, RecordState};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sync_state::PlanOutcome;
use tokio::sync::RwLock;
use transport::{exercise_tracking_path, CompletionPayload, HttpMethod};
use uuid::Uuid;

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum plans delivered concurrently in one pass
    pub max_concurrent_plans: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_plans: 4,
        }
    }
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrent_plans: config.max_concurrent_plans,
        }
    }
}

/// A completion as reported by the caller
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub plan_id: String,
    pub session_id: String,
    /// Free-text exercise title
    pub title: String,
    /// Caller-known exercise id; wins over the resolver's
    pub exercise_id: Option<String>,
    pub notes: String,
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

impl CompletionRequest {
    pub fn new(
        plan_id: impl Into<String>,
        session_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            session_id: session_id.into(),
            title: title.into(),
            exercise_id: None,
            notes: String::new(),
            date: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_exercise_id(mut self, exercise_id: impl Into<String>) -> Self {
        self.exercise_id = Some(exercise_id.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

/// Clears the running flag however the pass ends, including cancellation.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Main sync coordinator
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<LocalStore>,
    keys: CompletionKeyGenerator,
    transport: Arc<dyn RemoteTransport>,
    monitor: Arc<NetworkMonitor>,
    syncing: AtomicBool,
    in_flight: RwLock<HashSet<Uuid>>,
    state: RwLock<SyncState>,
    metrics: RwLock<SyncMetrics>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        store: Arc<LocalStore>,
        resolver: Arc<Resolver>,
        transport: Arc<dyn RemoteTransport>,
        monitor: Arc<NetworkMonitor>,
    ) -> Self {
        Self {
            config,
            store,
            keys: CompletionKeyGenerator::new(resolver),
            transport,
            monitor,
            syncing: AtomicBool::new(false),
            in_flight: RwLock::new(HashSet::new()),
            state: RwLock::new(SyncState::default()),
            metrics: RwLock::new(SyncMetrics::new()),
        }
    }

    /// Assemble the production engine: builtin library, on-disk store, HTTP.
    ///
    /// Runs [`SyncEngine::ensure_local_data_accessibility`] before returning.
    pub async fn open(app: &AppConfig) -> Result<Self, SetupError> {
        let library = Arc::new(ExerciseLibrary::builtin()?);
        let resolver = Arc::new(Resolver::new(library));
        let store = Arc::new(LocalStore::open(&app.database_path).await?);
        let transport: Arc<dyn RemoteTransport> = Arc::new(HttpTransport::new(app)?);

        let engine = Self::new(
            SyncConfig::from(app),
            store,
            resolver,
            transport,
            Arc::new(NetworkMonitor::default()),
        );
        engine.ensure_local_data_accessibility().await?;
        Ok(engine)
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    pub fn transport(&self) -> &Arc<dyn RemoteTransport> {
        &self.transport
    }

    pub fn resolve(&self, title: &str) -> Option<Resolution<'_>> {
        self.keys.resolver().resolve(title)
    }

    pub fn find_closest_match(&self, title: &str) -> Option<Resolution<'_>> {
        self.keys.resolver().find_closest_match(title)
    }

    /// Key the store uses for `title` in this plan/session.
    pub fn completion_key(&self, plan_id: &str, session_id: &str, title: &str) -> CompletionKey {
        self.keys.key(plan_id, session_id, title)
    }

    /// Persist a completion as unsynced. No network I/O.
    ///
    /// Recording the same exercise again in the same session replaces the
    /// earlier record and keeps its id.
    pub async fn record_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ExerciseTracking, StoreError> {
        let title = request.title.trim();
        let key = self.keys.key(&request.plan_id, &request.session_id, title);
        let resolved_id = self.resolve(title).map(|hit| hit.exercise.id.clone());
        let existing = self
            .find_completion(&request.plan_id, &request.session_id, title)
            .await;

        let exercise_id = request
            .exercise_id
            .or(resolved_id)
            .or_else(|| existing.as_ref().map(|e| e.exercise_id.clone()))
            .unwrap_or_else(ExerciseTracking::placeholder_exercise_id);

        let record = ExerciseTracking {
            id: existing.as_ref().map_or_else(Uuid::new_v4, |e| e.id),
            plan_id: request.plan_id,
            session_id: request.session_id,
            exercise_id,
            completion_key: key,
            display_title: title.to_string(),
            date: request.date.unwrap_or_else(Utc::now),
            notes: request.notes,
            is_synced: false,
            last_sync_attempt: existing.as_ref().and_then(|e| e.last_sync_attempt),
            sync_error: None,
        };

        let stored = self.store.upsert_completion(record).await?;
        tracing::info!(
            plan = %stored.plan_id,
            session = %stored.session_id,
            key = %stored.completion_key,
            "recorded completion"
        );
        Ok(stored)
    }

    /// Record for `title` in this plan/session.
    ///
    /// Falls back to comparing titles so records migrated with a legacy key
    /// are still found.
    pub async fn find_completion(
        &self,
        plan_id: &str,
        session_id: &str,
        title: &str,
    ) -> Option<ExerciseTracking> {
        let key = self.keys.key(plan_id, session_id, title);
        if let Some(record) = self.store.completion_by_key(plan_id, session_id, &key).await {
            return Some(record);
        }
        self.store
            .completions(plan_id)
            .await
            .into_iter()
            .filter(|c| c.session_id == session_id && !c.display_title.is_empty())
            .find(|c| self.keys.key(plan_id, session_id, &c.display_title) == key)
    }

    pub async fn is_completed(&self, plan_id: &str, session_id: &str, title: &str) -> bool {
        self.find_completion(plan_id, session_id, title).await.is_some()
    }

    /// Un-complete an exercise locally. Returns whether a record was removed.
    pub async fn remove_completion(
        &self,
        plan_id: &str,
        session_id: &str,
        title: &str,
    ) -> Result<bool, StoreError> {
        match self.find_completion(plan_id, session_id, title).await {
            Some(record) => Ok(self.store.remove_completion(record.id).await?.is_some()),
            None => Ok(false),
        }
    }

    pub async fn completions(&self, plan_id: &str) -> Vec<ExerciseTracking> {
        self.store.completions(plan_id).await
    }

    /// State of one record, `Syncing` while its delivery is in flight.
    pub async fn completion_state(
        &self,
        plan_id: &str,
        session_id: &str,
        title: &str,
    ) -> Option<RecordState> {
        let record = self.find_completion(plan_id, session_id, title).await?;
        let in_flight = self.in_flight.read().await;
        Some(sync_state::record_state(&record, &in_flight))
    }

    pub async fn get_sync_status(&self, plan_id: &str) -> SyncStatus {
        let records = self.store.completions(plan_id).await;
        let in_flight = self.in_flight.read().await;
        SyncStatus::tally(&records, &in_flight)
    }

    pub async fn overall_sync_status(&self) -> SyncStatus {
        let mut total = SyncStatus::default();
        for plan_id in self.store.plan_ids().await {
            total.add(self.get_sync_status(&plan_id).await);
        }
        total
    }

    /// Deliver every unsynced record once.
    ///
    /// Never fails: delivery errors are stored on the records and listed in
    /// the report. A pass is skipped while another one runs or while offline.
    pub async fn force_complete_sync(&self) -> SyncReport {
        let clock = Instant::now();
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("sync pass already running; skipping");
            let report = SyncReport::skipped(SkipReason::AlreadyRunning);
            self.metrics.write().await.record_pass(&report, clock.elapsed());
            return report;
        }
        let _guard = PassGuard(&self.syncing);

        let network_status = self.monitor.status();
        self.state.write().await.network_status = network_status;
        if !network_status.is_connected() {
            tracing::info!("offline; sync pass skipped");
            let report = SyncReport::skipped(SkipReason::Offline);
            self.metrics.write().await.record_pass(&report, clock.elapsed());
            return report;
        }

        let mut report = SyncReport::new(Utc::now());
        let pending = self.store.unsynced_by_plan().await;
        tracing::info!(plans = pending.len(), "starting sync pass");

        let outcomes: Vec<PlanOutcome> = stream::iter(pending)
            .map(|(plan_id, records)| async move { self.sync_plan(&plan_id, records).await })
            .buffer_unordered(self.config.max_concurrent_plans.max(1))
            .collect()
            .await;
        for outcome in outcomes {
            report.absorb(outcome);
        }
        report.failures.sort_by(|a, b| {
            (&a.plan_id, &a.completion_key).cmp(&(&b.plan_id, &b.completion_key))
        });

        tracing::info!(
            plans = report.plans,
            synced = report.synced,
            failed = report.failed,
            "sync pass finished"
        );
        {
            let mut state = self.state.write().await;
            state.last_sync = Some(Utc::now());
            state.last_report = Some(report.clone());
        }
        self.metrics.write().await.record_pass(&report, clock.elapsed());
        report
    }

    /// Deliver one plan's records in order. A failure does not stop the batch.
    async fn sync_plan(&self, plan_id: &str, records: Vec<ExerciseTracking>) -> PlanOutcome {
        let mut outcome = PlanOutcome::default();
        for record in records {
            self.in_flight.write().await.insert(record.id);
            let delivered = self.deliver(&record).await;
            let result = match &delivered {
                Ok(()) => DeliveryOutcome::Delivered { at: Utc::now() },
                Err(err) => DeliveryOutcome::Failed {
                    at: Utc::now(),
                    error: err.diagnostic(),
                },
            };
            if let Err(err) = self.store.record_delivery_outcome(&record, result).await {
                tracing::warn!(id = %record.id, error = %err, "could not persist delivery outcome");
            }
            self.in_flight.write().await.remove(&record.id);

            match delivered {
                Ok(()) => outcome.synced += 1,
                Err(err) => {
                    tracing::warn!(
                        plan = plan_id,
                        key = %record.completion_key,
                        error = %err,
                        "delivery failed"
                    );
                    if matches!(err, TransportError::Network { .. }) {
                        self.monitor.set_status(NetworkStatus::Offline);
                    }
                    outcome.failures.push(DeliveryFailure {
                        id: record.id,
                        plan_id: plan_id.to_string(),
                        completion_key: record.completion_key.to_string(),
                        error: err.diagnostic(),
                    });
                }
            }
        }
        outcome
    }

    async fn deliver(&self, record: &ExerciseTracking) -> Result<(), TransportError> {
        let body = serde_json::to_value(CompletionPayload::from(record))?;
        self.transport
            .send(
                HttpMethod::Post,
                &exercise_tracking_path(&record.plan_id),
                Some(body),
            )
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Probe the server outside of a pass and publish the result.
    pub async fn test_server_connectivity(&self) -> (bool, String) {
        let (status, message) = network_monitor::probe(self.transport.as_ref()).await;
        self.monitor.set_status(status);
        self.state.write().await.network_status = status;
        (status == NetworkStatus::Online, message)
    }

    /// Drop local data for plans that no longer exist.
    pub async fn prune_orphan_plan_data<I, S>(&self, current_plan_ids: I) -> Result<PruneStats, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let valid: HashSet<String> = current_plan_ids.into_iter().map(Into::into).collect();
        self.store.prune_orphans(&valid).await
    }

    pub async fn clear_all_data(&self) -> Result<(), StoreError> {
        self.store.clear_all().await
    }

    /// Flush everything to disk. Call from background/terminate hooks.
    pub async fn save_all_data(&self) -> Result<(), StoreError> {
        self.store.save_all().await
    }

    /// Re-open local data after a resume and repair records that predate
    /// typed keys and titles.
    pub async fn ensure_local_data_accessibility(&self) -> Result<DatabaseStats, StoreError> {
        self.store.ensure_accessible().await?;
        self.store
            .repair_legacy_completions(|record| {
                let title = self.legacy_title(record);
                let key = self.keys.key(&record.plan_id, &record.session_id, &title);
                (title, key)
            })
            .await?;
        self.store.stats().await
    }

    /// Best available title for a record that predates typed titles.
    ///
    /// Falls back from the stored title to the library name of its exercise
    /// id, then the tail of a legacy key, then the exercise id itself.
    fn legacy_title(&self, record: &ExerciseTracking) -> String {
        if !record.display_title.is_empty() {
            return record.display_title.clone();
        }
        if let Some((exercise, _)) = self
            .keys
            .resolver()
            .library()
            .find_by_id(&record.exercise_id)
        {
            return exercise.name.clone();
        }
        record
            .completion_key
            .last_segment()
            .map(str::to_string)
            .unwrap_or_else(|| record.exercise_id.clone())
    }

    /// Snapshot of the engine state.
    pub async fn sync_state(&self) -> SyncState {
        let mut state = self.state.read().await.clone();
        state.is_syncing = self.syncing.load(Ordering::Acquire);
        state.network_status = self.monitor.status();
        state
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }
}
