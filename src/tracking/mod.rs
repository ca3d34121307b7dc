//! # Tracking Records
//!
//! Session and exercise-completion records owned by the local store, plus
//! completion key derivation and the legacy notes-tag parser.
//!
//! An [`ExerciseTracking`] moves through
//! `Unsynced -> Syncing -> Synced | Unsynced(error)`. `Syncing` only exists
//! while a delivery is in flight and is never persisted; editing a synced
//! record puts it back to `Unsynced`.

pub mod key;
pub mod legacy;

pub use key::{CompletionKey, CompletionKeyGenerator};
pub use legacy::LegacyTags;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scheduled session instance inside a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTracking {
    pub plan_id: String,
    /// Opaque, stable session identifier from the plan
    pub session_id: String,
    /// Free-text focus/title of the session
    pub focus: String,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

impl SessionTracking {
    pub fn new(
        plan_id: impl Into<String>,
        session_id: impl Into<String>,
        focus: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            session_id: session_id.into(),
            focus: focus.into(),
            notes: String::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Sync state of a completion record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never acknowledged, no failed attempt since the last edit
    Pending,
    /// Delivery in flight. Only reported by the sync engine.
    Syncing,
    /// Last attempt failed; retried on the next pass
    Failed,
    /// Acknowledged by the server
    Synced,
}

/// A completion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseTracking {
    /// Assigned once, never reassigned
    pub id: Uuid,
    pub plan_id: String,
    pub session_id: String,
    /// Library exercise id, or a caller/local placeholder when unresolved
    pub exercise_id: String,
    pub completion_key: CompletionKey,
    /// Title as shown to the user
    pub display_title: String,
    pub date: DateTime<Utc>,
    /// User-visible notes only
    pub notes: String,
    pub is_synced: bool,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}

impl ExerciseTracking {
    pub fn state(&self) -> RecordState {
        if self.is_synced {
            RecordState::Synced
        } else if self.sync_error.is_some() {
            RecordState::Failed
        } else {
            RecordState::Pending
        }
    }

    /// Server acknowledged the record.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.is_synced = true;
        self.sync_error = None;
        self.last_sync_attempt = Some(at);
    }

    /// Delivery failed; the record stays unsynced.
    pub fn mark_failed(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.is_synced = false;
        self.sync_error = Some(error.into());
        self.last_sync_attempt = Some(at);
    }

    /// Content changed locally; the server copy is stale again.
    pub fn mark_edited(&mut self) {
        self.is_synced = false;
        self.sync_error = None;
    }

    /// Placeholder exercise id for titles the resolver could not place.
    pub fn placeholder_exercise_id() -> String {
        format!("local-{}", Uuid::new_v4())
    }
}
