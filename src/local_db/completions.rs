//! Completion record operations.

use super::{parse_timestamp, LocalStore, Result};
use crate::shared::error::StoreError;
use crate::tracking::{CompletionKey, ExerciseTracking};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { at: DateTime<Utc> },
    Failed { at: DateTime<Utc>, error: String },
}

impl LocalStore {
    /// Insert or replace a completion.
    ///
    /// Matching is by id first, then by `(plan, session, key)`. A key match keeps
    /// the stored id. Any other record left sharing the key is dropped, so one
    /// key never maps to two records. Returns the stored record.
    pub async fn upsert_completion(&self, record: ExerciseTracking) -> Result<ExerciseTracking> {
        let mut state = self.state.lock().await;
        let plan = state.plan_mut(&record.plan_id);

        let mut stored = record;
        // Legacy rows awaiting a key never match each other.
        let keyless = stored.completion_key.as_str().is_empty();
        let position = match plan.completions.iter().position(|c| c.id == stored.id) {
            Some(index) => Some(index),
            None if keyless => None,
            None => {
                let by_key = plan.completions.iter().position(|c| {
                    c.session_id == stored.session_id && c.completion_key == stored.completion_key
                });
                if let Some(index) = by_key {
                    stored.id = plan.completions[index].id;
                }
                by_key
            }
        };
        match position {
            Some(index) => plan.completions[index] = stored.clone(),
            None => plan.completions.push(stored.clone()),
        }

        let mut displaced = Vec::new();
        plan.completions.retain(|c| {
            let duplicate = !keyless
                && c.id != stored.id
                && c.session_id == stored.session_id
                && c.completion_key == stored.completion_key;
            if duplicate {
                displaced.push(c.id);
            }
            !duplicate
        });

        let flushed = async {
            let mut tx = self.pool().begin().await?;
            for id in &displaced {
                delete_completion(&mut tx, id).await?;
            }
            write_completion(&mut tx, &stored).await?;
            tx.commit().await
        }
        .await;
        state.flushed(flushed)?;

        tracing::debug!(
            id = %stored.id,
            key = %stored.completion_key,
            replaced = position.is_some(),
            "stored completion"
        );
        Ok(stored)
    }

    /// Whether a record with this key exists.
    pub async fn is_completed(&self, plan_id: &str, session_id: &str, key: &CompletionKey) -> bool {
        self.completion_by_key(plan_id, session_id, key).await.is_some()
    }

    pub async fn completion_by_key(
        &self,
        plan_id: &str,
        session_id: &str,
        key: &CompletionKey,
    ) -> Option<ExerciseTracking> {
        let state = self.state.lock().await;
        state.plans.get(plan_id).and_then(|plan| {
            plan.completions
                .iter()
                .find(|c| c.session_id == session_id && &c.completion_key == key)
                .cloned()
        })
    }

    pub async fn completion(&self, id: Uuid) -> Option<ExerciseTracking> {
        let state = self.state.lock().await;
        state
            .plans
            .values()
            .flat_map(|plan| plan.completions.iter())
            .find(|c| c.id == id)
            .cloned()
    }

    /// All completions for a plan, in insertion order.
    pub async fn completions(&self, plan_id: &str) -> Vec<ExerciseTracking> {
        let state = self.state.lock().await;
        state
            .plans
            .get(plan_id)
            .map(|plan| plan.completions.clone())
            .unwrap_or_default()
    }

    /// Remove a completion by id.
    pub async fn remove_completion(&self, id: Uuid) -> Result<Option<ExerciseTracking>> {
        let mut state = self.state.lock().await;
        let found = state.plans.iter_mut().find_map(|(plan_id, plan)| {
            let index = plan.completions.iter().position(|c| c.id == id)?;
            Some((plan_id.clone(), plan.completions.remove(index)))
        });
        let Some((plan_id, removed)) = found else {
            return Ok(None);
        };
        state.drop_if_empty(&plan_id);

        let flushed = async {
            let mut tx = self.pool().begin().await?;
            delete_completion(&mut tx, &id).await?;
            tx.commit().await
        }
        .await;
        state.flushed(flushed)?;
        Ok(Some(removed))
    }

    /// Remove the completion carrying `key`, if any.
    pub async fn remove_by_key(
        &self,
        plan_id: &str,
        session_id: &str,
        key: &CompletionKey,
    ) -> Result<Option<ExerciseTracking>> {
        match self.completion_by_key(plan_id, session_id, key).await {
            Some(record) => self.remove_completion(record.id).await,
            None => Ok(None),
        }
    }

    /// Apply a delivery outcome to the stored copy of `delivered`.
    ///
    /// Only sync fields change. If the record was edited while the delivery was
    /// in flight, a success only stamps the attempt time and the record stays
    /// unsynced. Returns `false` when the record no longer exists.
    pub async fn record_delivery_outcome(
        &self,
        delivered: &ExerciseTracking,
        outcome: DeliveryOutcome,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(current) = state
            .plans
            .get_mut(&delivered.plan_id)
            .and_then(|plan| plan.completions.iter_mut().find(|c| c.id == delivered.id))
        else {
            return Ok(false);
        };

        match outcome {
            DeliveryOutcome::Delivered { at } if same_content(current, delivered) => {
                current.mark_synced(at);
            }
            DeliveryOutcome::Delivered { at } => {
                tracing::debug!(id = %current.id, "record edited during delivery; left unsynced");
                current.last_sync_attempt = Some(at);
            }
            DeliveryOutcome::Failed { at, error } => current.mark_failed(at, error),
        }
        let updated = current.clone();

        let flushed = async {
            let mut conn = self.pool().acquire().await?;
            write_sync_fields(&mut conn, &updated).await
        }
        .await;
        state.flushed(flushed)?;
        Ok(true)
    }

    /// Unsynced completions grouped by plan; plans with none are left out.
    pub async fn unsynced_by_plan(&self) -> BTreeMap<String, Vec<ExerciseTracking>> {
        let state = self.state.lock().await;
        state
            .plans
            .iter()
            .filter_map(|(plan_id, plan)| {
                let pending: Vec<_> = plan
                    .completions
                    .iter()
                    .filter(|c| !c.is_synced)
                    .cloned()
                    .collect();
                (!pending.is_empty()).then(|| (plan_id.clone(), pending))
            })
            .collect()
    }

    /// Give records that predate typed fields a key and a title.
    ///
    /// `derive` returns the title and key a legacy record should carry. A
    /// keyless record takes both; a record with a legacy key keeps it and only
    /// takes the title. A record whose derived key already belongs to another
    /// record of the same session is dropped. Newer rows are handled first, so
    /// among legacy duplicates the newest survives. Runs under one lock and
    /// flushes in one transaction.
    pub async fn repair_legacy_completions<F>(&self, derive: F) -> Result<LegacyRepairStats>
    where
        F: Fn(&ExerciseTracking) -> (String, CompletionKey),
    {
        let mut state = self.state.lock().await;
        let mut stats = LegacyRepairStats::default();
        let mut updated = Vec::new();
        let mut dropped = Vec::new();

        for plan in state.plans.values_mut() {
            for index in (0..plan.completions.len()).rev() {
                let record = &plan.completions[index];
                let keyless = record.completion_key.as_str().is_empty();
                if !keyless && !record.display_title.is_empty() {
                    continue;
                }

                let (title, key) = derive(record);
                let superseded = plan.completions.iter().any(|c| {
                    c.id != record.id && c.session_id == record.session_id && c.completion_key == key
                });
                if superseded {
                    let removed = plan.completions.remove(index);
                    tracing::debug!(id = %removed.id, key = %key, "dropping superseded legacy record");
                    dropped.push(removed.id);
                    continue;
                }

                let record = &mut plan.completions[index];
                if keyless {
                    record.completion_key = key;
                    stats.keyed += 1;
                }
                if record.display_title.is_empty() {
                    record.display_title = title;
                    stats.titled += 1;
                }
                updated.push(record.clone());
            }
        }
        state.plans.retain(|_, plan| !plan.is_empty());
        stats.dropped = dropped.len() as u64;

        if updated.is_empty() && dropped.is_empty() {
            return Ok(stats);
        }
        let flushed = async {
            let mut tx = self.pool().begin().await?;
            for id in &dropped {
                delete_completion(&mut tx, id).await?;
            }
            for record in &updated {
                write_completion(&mut tx, record).await?;
            }
            tx.commit().await
        }
        .await;
        state.flushed(flushed)?;

        tracing::info!(
            keyed = stats.keyed,
            titled = stats.titled,
            dropped = stats.dropped,
            "repaired legacy completions"
        );
        Ok(stats)
    }
}

/// Outcome of [`LocalStore::repair_legacy_completions`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyRepairStats {
    pub keyed: u64,
    pub titled: u64,
    pub dropped: u64,
}

fn same_content(a: &ExerciseTracking, b: &ExerciseTracking) -> bool {
    a.session_id == b.session_id
        && a.exercise_id == b.exercise_id
        && a.completion_key == b.completion_key
        && a.display_title == b.display_title
        && a.date == b.date
        && a.notes == b.notes
}

pub(crate) async fn write_completion(
    conn: &mut SqliteConnection,
    record: &ExerciseTracking,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exercise_tracking
            (id, plan_id, session_id, exercise_id, completion_key, display_title,
             date, notes, is_synced, last_sync_attempt, sync_error)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            plan_id = excluded.plan_id,
            session_id = excluded.session_id,
            exercise_id = excluded.exercise_id,
            completion_key = excluded.completion_key,
            display_title = excluded.display_title,
            date = excluded.date,
            notes = excluded.notes,
            is_synced = excluded.is_synced,
            last_sync_attempt = excluded.last_sync_attempt,
            sync_error = excluded.sync_error",
    )
    .bind(record.id.to_string())
    .bind(&record.plan_id)
    .bind(&record.session_id)
    .bind(&record.exercise_id)
    .bind(record.completion_key.as_str())
    .bind(&record.display_title)
    .bind(record.date.to_rfc3339())
    .bind(&record.notes)
    .bind(record.is_synced)
    .bind(record.last_sync_attempt.map(|t| t.to_rfc3339()))
    .bind(&record.sync_error)
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_sync_fields(
    conn: &mut SqliteConnection,
    record: &ExerciseTracking,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exercise_tracking
         SET is_synced = ?, last_sync_attempt = ?, sync_error = ?
         WHERE id = ?",
    )
    .bind(record.is_synced)
    .bind(record.last_sync_attempt.map(|t| t.to_rfc3339()))
    .bind(&record.sync_error)
    .bind(record.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

async fn delete_completion(
    conn: &mut SqliteConnection,
    id: &Uuid,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exercise_tracking WHERE id = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) fn completion_from_row(row: &SqliteRow) -> Result<ExerciseTracking> {
    const TABLE: &str = "exercise_tracking";

    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| StoreError::corrupt_record(TABLE, format!("bad id '{}': {}", id, e)))?;
    let date: String = row.try_get("date")?;
    let last_sync_attempt: Option<String> = row.try_get("last_sync_attempt")?;
    let completion_key: String = row.try_get("completion_key")?;

    Ok(ExerciseTracking {
        id,
        plan_id: row.try_get("plan_id")?,
        session_id: row.try_get("session_id")?,
        exercise_id: row.try_get("exercise_id")?,
        completion_key: CompletionKey::from_raw(completion_key),
        display_title: row.try_get("display_title")?,
        date: parse_timestamp(TABLE, &date)?,
        notes: row.try_get("notes")?,
        is_synced: row.try_get("is_synced")?,
        last_sync_attempt: last_sync_attempt
            .as_deref()
            .map(|t| parse_timestamp(TABLE, t))
            .transpose()?,
        sync_error: row.try_get("sync_error")?,
    })
}
