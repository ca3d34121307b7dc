//! # Local Database Module
//!
//! Durable, on-device storage for session tracking and exercise completion
//! records, scoped by plan id.
//!
//! ## Architecture
//!
//! The store keeps the full record set in memory behind a single async mutex
//! and mirrors every mutation into SQLite before returning:
//! - **State**: per-plan ordered lists of sessions and completions
//! - **Write-through**: each mutating call holds the lock across its flush, so
//!   read-modify-write sequences (upsert by key) are atomic
//! - **Lifecycle hooks**: [`LocalStore::save_all`] rewrites the whole image and
//!   [`LocalStore::ensure_accessible`] re-reads it after a resume
//!
//! If a flush fails the mutation stays in memory, the store is marked dirty and
//! the error goes back to the caller; the next `save_all` retries it.
//!
//! ## Key Components
//!
//! - `schema.rs`: table definitions and migration versions
//! - `sessions.rs`: session tracking operations
//! - `completions.rs`: completion record operations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trainlog::local_db::LocalStore;
//!
//! # async fn example() -> Result<(), trainlog::shared::error::StoreError> {
//! let store = LocalStore::open("/tmp/trainlog.db").await?;
//! let records = store.completions("plan-1").await;
//! println!("{} completions", records.len());
//! # Ok(())
//! # }
//! ```

pub mod completions;
pub mod schema;
pub mod sessions;

pub use completions::{DeliveryOutcome, LegacyRepairStats};

use crate::shared::error::StoreError;
use crate::tracking::{ExerciseTracking, LegacyTags, SessionTracking};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Records belonging to one plan
#[derive(Debug, Clone, Default)]
pub(crate) struct PlanData {
    pub(crate) sessions: Vec<SessionTracking>,
    pub(crate) completions: Vec<ExerciseTracking>,
}

impl PlanData {
    fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.completions.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) plans: BTreeMap<String, PlanData>,
    /// A flush failed since the last successful `save_all`
    pub(crate) dirty: bool,
}

/// Local store handle
///
/// One per process; share it through an `Arc`.
#[derive(Debug)]
pub struct LocalStore {
    pool: SqlitePool,
    pub(crate) state: Mutex<StoreState>,
}

impl LocalStore {
    /// Open or create the database at `path`, run migrations and load it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "opened local store");
        Self::from_pool(pool).await
    }

    /// Private in-memory database. Contents vanish with the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        init_schema(&pool).await?;
        let plans = load_plans(&pool).await?;
        Ok(Self {
            pool,
            state: Mutex::new(StoreState {
                plans,
                dirty: false,
            }),
        })
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Plan ids with at least one stored record.
    pub async fn plan_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.plans.keys().cloned().collect()
    }

    /// Whether a flush has failed since the last successful `save_all`.
    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Rewrite the whole on-disk image from memory.
    ///
    /// Called from background/terminate lifecycle hooks and to retry after a
    /// failed flush.
    pub async fn save_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.write_image(&mut state).await
    }

    async fn write_image(&self, state: &mut StoreState) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_tracking")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM exercise_tracking")
            .execute(&mut *tx)
            .await?;
        for plan in state.plans.values() {
            for session in &plan.sessions {
                sessions::write_session(&mut *tx, session).await?;
            }
            for record in &plan.completions {
                completions::write_completion(&mut *tx, record).await?;
            }
        }
        tx.commit().await?;
        state.dirty = false;
        tracing::debug!(plans = state.plans.len(), "saved local store image");
        Ok(())
    }

    /// Make sure the on-disk data is readable and in sync with memory.
    ///
    /// A dirty store is flushed; a clean one is re-read from disk. Holds the
    /// state lock throughout.
    pub async fn ensure_accessible(&self) -> Result<DatabaseStats> {
        {
            let mut state = self.state.lock().await;
            if state.dirty {
                self.write_image(&mut state).await?;
            } else {
                state.plans = load_plans(&self.pool).await?;
            }
        }
        self.stats().await
    }

    /// Remove every record whose plan is not in `valid_plan_ids`.
    pub async fn prune_orphans(&self, valid_plan_ids: &HashSet<String>) -> Result<PruneStats> {
        let mut state = self.state.lock().await;
        let orphans: Vec<String> = state
            .plans
            .keys()
            .filter(|plan_id| !valid_plan_ids.contains(*plan_id))
            .cloned()
            .collect();

        let mut stats = PruneStats::default();
        for plan_id in &orphans {
            if let Some(plan) = state.plans.remove(plan_id) {
                stats.plans_removed += 1;
                stats.sessions_removed += plan.sessions.len() as u64;
                stats.completions_removed += plan.completions.len() as u64;
            }
        }
        if orphans.is_empty() {
            return Ok(stats);
        }

        let flushed = async {
            let mut tx = self.pool.begin().await?;
            for plan_id in &orphans {
                sqlx::query("DELETE FROM session_tracking WHERE plan_id = ?")
                    .bind(plan_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM exercise_tracking WHERE plan_id = ?")
                    .bind(plan_id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        }
        .await;
        state.flushed(flushed)?;

        tracing::info!(
            plans = stats.plans_removed,
            completions = stats.completions_removed,
            "pruned orphan plan data"
        );
        Ok(stats)
    }

    /// Drop every record.
    pub async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.plans.clear();

        let flushed = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM session_tracking")
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM exercise_tracking")
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        }
        .await;
        state.flushed(flushed)?;
        tracing::info!("cleared local store");
        Ok(())
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let state = self.state.lock().await;
        let mut stats = DatabaseStats {
            plan_count: state.plans.len() as u64,
            ..DatabaseStats::default()
        };
        for plan in state.plans.values() {
            stats.session_count += plan.sessions.len() as u64;
            stats.completion_count += plan.completions.len() as u64;
            stats.unsynced_count += plan.completions.iter().filter(|c| !c.is_synced).count() as u64;
        }
        Ok(stats)
    }
}

impl StoreState {
    /// Record the result of a write-through flush.
    pub(crate) fn flushed(
        &mut self,
        result: std::result::Result<(), sqlx::Error>,
    ) -> Result<()> {
        if let Err(err) = result {
            self.dirty = true;
            tracing::error!(error = %err, "local store flush failed; change kept in memory");
            return Err(err.into());
        }
        Ok(())
    }

    pub(crate) fn plan_mut(&mut self, plan_id: &str) -> &mut PlanData {
        self.plans.entry(plan_id.to_string()).or_default()
    }

    /// Drop the plan entry if nothing is left in it.
    pub(crate) fn drop_if_empty(&mut self, plan_id: &str) {
        if self.plans.get(plan_id).is_some_and(PlanData::is_empty) {
            self.plans.remove(plan_id);
        }
    }
}

/// Initialize database schema
///
/// Creates the version 1 tables if missing, then runs pending migrations.
async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in [
        schema::CREATE_SCHEMA_MIGRATIONS,
        schema::CREATE_SESSION_TRACKING,
        schema::CREATE_EXERCISE_TRACKING_V1,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    run_migrations(pool).await
}

/// Run database migrations
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version: (i32,) =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(pool)
            .await?;
    if !schema::needs_migration(current_version.0) {
        return Ok(());
    }

    for version in schema::get_pending_migrations(current_version.0) {
        match version {
            1 => apply_migration_1(pool).await?,
            2 => apply_migration_2(pool).await?,
            other => {
                return Err(StoreError::corrupt_record(
                    "schema_migrations",
                    format!("no migration registered for version {}", other),
                ))
            }
        }
        tracing::info!(version, "applied local store migration");
    }
    Ok(())
}

async fn mark_migration(tx: &mut sqlx::SqliteConnection, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
        .bind(version)
        .bind(Utc::now().to_rfc3339())
        .execute(tx)
        .await?;
    Ok(())
}

/// Migration 1: Initial schema
async fn apply_migration_1(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    mark_migration(&mut tx, 1).await?;
    tx.commit().await?;
    Ok(())
}

/// Migration 2: typed key/title columns, lifted out of legacy notes tags.
async fn apply_migration_2(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in schema::MIGRATION_2_COLUMNS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let rows = sqlx::query("SELECT id, notes FROM exercise_tracking WHERE notes LIKE '%[%'")
        .fetch_all(&mut *tx)
        .await?;
    let mut migrated = 0u64;
    for row in rows {
        let id: String = row.try_get("id")?;
        let notes: String = row.try_get("notes")?;
        if !LegacyTags::present_in(&notes) {
            continue;
        }
        let tags = LegacyTags::extract(&notes);
        sqlx::query(
            "UPDATE exercise_tracking
             SET notes = ?, completion_key = ?, display_title = ?
             WHERE id = ?",
        )
        .bind(&tags.notes)
        .bind(tags.key.unwrap_or_default())
        .bind(tags.exercise_title.unwrap_or_default())
        .bind(&id)
        .execute(&mut *tx)
        .await?;
        migrated += 1;
    }

    sqlx::query(schema::MIGRATION_2_DEDUPE)
        .execute(&mut *tx)
        .await?;
    for statement in schema::MIGRATION_2_INDEXES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    mark_migration(&mut tx, 2).await?;
    tx.commit().await?;

    if migrated > 0 {
        tracing::info!(records = migrated, "migrated legacy notes tags");
    }
    Ok(())
}

/// Read both tables into per-plan collections, preserving insertion order.
async fn load_plans(pool: &SqlitePool) -> Result<BTreeMap<String, PlanData>> {
    let mut plans: BTreeMap<String, PlanData> = BTreeMap::new();

    let rows = sqlx::query(
        "SELECT plan_id, session_id, focus, notes, updated_at
         FROM session_tracking ORDER BY rowid ASC",
    )
    .fetch_all(pool)
    .await?;
    for row in &rows {
        let session = sessions::session_from_row(row)?;
        plans
            .entry(session.plan_id.clone())
            .or_default()
            .sessions
            .push(session);
    }

    let rows = sqlx::query(
        "SELECT id, plan_id, session_id, exercise_id, completion_key, display_title,
                date, notes, is_synced, last_sync_attempt, sync_error
         FROM exercise_tracking ORDER BY rowid ASC",
    )
    .fetch_all(pool)
    .await?;
    for row in &rows {
        let record = completions::completion_from_row(row)?;
        plans
            .entry(record.plan_id.clone())
            .or_default()
            .completions
            .push(record);
    }

    Ok(plans)
}

pub(crate) fn parse_timestamp(table: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt_record(table, format!("bad timestamp '{}': {}", value, e)))
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub plan_count: u64,
    pub session_count: u64,
    pub completion_count: u64,
    /// Completions not yet acknowledged by the server
    pub unsynced_count: u64,
}

/// Orphan pruning statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub plans_removed: u64,
    pub sessions_removed: u64,
    pub completions_removed: u64,
}
