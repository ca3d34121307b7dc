//! Database Schema Definitions
//!
//! Version 1 is the original layout, where exercise metadata lived in bracketed
//! tags inside `notes`. Version 2 adds typed `completion_key` and
//! `display_title` columns and moves the tag values into them.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Schema migration versions
pub const MIGRATION_VERSIONS: &[i32] = &[1, 2];

pub const CREATE_SCHEMA_MIGRATIONS: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

pub const CREATE_SESSION_TRACKING: &str = "CREATE TABLE IF NOT EXISTS session_tracking (
    plan_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    focus TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    updated_at TEXT NOT NULL,
    PRIMARY KEY (plan_id, session_id)
)";

/// Version 1 layout of the completion table.
pub const CREATE_EXERCISE_TRACKING_V1: &str = "CREATE TABLE IF NOT EXISTS exercise_tracking (
    id TEXT PRIMARY KEY,
    plan_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    date TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    is_synced INTEGER NOT NULL DEFAULT 0,
    last_sync_attempt TEXT,
    sync_error TEXT
)";

/// Statements applied by migration 2, before tag extraction.
pub const MIGRATION_2_COLUMNS: &[&str] = &[
    "ALTER TABLE exercise_tracking ADD COLUMN completion_key TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE exercise_tracking ADD COLUMN display_title TEXT NOT NULL DEFAULT ''",
];

/// Keeps the newest row per key; older legacy duplicates are dropped.
pub const MIGRATION_2_DEDUPE: &str = "DELETE FROM exercise_tracking
    WHERE completion_key != ''
      AND rowid NOT IN (
        SELECT MAX(rowid) FROM exercise_tracking
        WHERE completion_key != ''
        GROUP BY plan_id, session_id, completion_key
      )";

/// Statements applied by migration 2, after tag extraction.
pub const MIGRATION_2_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_exercise_tracking_plan ON exercise_tracking (plan_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_exercise_tracking_key
        ON exercise_tracking (plan_id, session_id, completion_key)
        WHERE completion_key != ''",
];

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<i32> {
    MIGRATION_VERSIONS
        .iter()
        .filter(|&&v| v > current_version)
        .cloned()
        .collect()
}
