//! Legacy database migration tests
//!
//! A version 1 database kept exercise titles and keys as bracketed tags in
//! `notes`. Opening it must lift them into typed fields and key every record.

use crate::common::*;
use pretty_assertions::assert_eq;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::Path;
use trainlog::local_db::schema;
use trainlog::sync::{CompletionRequest, NetworkStatus};
use wiremock::MockServer;

struct LegacyRow {
    id: &'static str,
    session_id: &'static str,
    exercise_id: &'static str,
    notes: &'static str,
    is_synced: bool,
}

const LEGACY_ROWS: &[LegacyRow] = &[
    LegacyRow {
        id: "6c1f7a5e-0c55-4f7e-9a43-7f0f1b6a0001",
        session_id: "w1-d1",
        exercise_id: "fingerboard-max-hangs-crimps",
        notes: "[EXERCISE:Fingerboard Max Hangs] [KEY:plan-1::w1-d1::fingerboard max hangs] felt strong",
        is_synced: true,
    },
    LegacyRow {
        id: "6c1f7a5e-0c55-4f7e-9a43-7f0f1b6a0002",
        session_id: "w1-d1",
        exercise_id: "local-legacy",
        notes: "[EXERCISE:Silent Feet Drill]",
        is_synced: false,
    },
    LegacyRow {
        id: "6c1f7a5e-0c55-4f7e-9a43-7f0f1b6a0003",
        session_id: "w1-d2",
        exercise_id: "campus-ladders",
        notes: "no tags here",
        is_synced: false,
    },
];

async fn seed_version_1(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();
    for statement in [
        schema::CREATE_SCHEMA_MIGRATIONS,
        schema::CREATE_SESSION_TRACKING,
        schema::CREATE_EXERCISE_TRACKING_V1,
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (1, '2024-03-01T08:00:00+00:00')")
        .execute(&pool)
        .await
        .unwrap();

    for row in LEGACY_ROWS {
        sqlx::query(
            "INSERT INTO exercise_tracking (id, plan_id, session_id, exercise_id, date, notes, is_synced)
             VALUES (?, 'plan-1', ?, ?, '2024-03-01T09:30:00+00:00', ?, ?)",
        )
        .bind(row.id)
        .bind(row.session_id)
        .bind(row.exercise_id)
        .bind(row.notes)
        .bind(row.is_synced)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool.close().await;
}

#[tokio::test]
async fn test_legacy_tags_become_typed_fields() {
    let (_dir, path) = temp_db();
    seed_version_1(&path).await;

    let store = open_store(&path).await;
    let records = store.completions("plan-1").await;
    assert_eq!(records.len(), 3);

    let tagged = &records[0];
    assert_eq!(tagged.display_title, "Fingerboard Max Hangs");
    assert_eq!(
        tagged.completion_key.as_str(),
        "plan-1::w1-d1::fingerboard max hangs"
    );
    assert_eq!(tagged.notes, "felt strong");
    assert!(tagged.is_synced);

    let title_only = &records[1];
    assert_eq!(title_only.display_title, "Silent Feet Drill");
    assert!(title_only.completion_key.as_str().is_empty());
    assert_eq!(title_only.notes, "");

    let plain = &records[2];
    assert_eq!(plain.notes, "no tags here");
    assert!(plain.display_title.is_empty());

    let version: (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(version.0, schema::CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_accessibility_check_keys_legacy_records() {
    let (_dir, path) = temp_db();
    seed_version_1(&path).await;

    let server = MockServer::start().await;
    let engine = engine_with(
        open_store(&path).await,
        std::sync::Arc::new(http_transport(&server)),
        NetworkStatus::Offline,
    );
    let stats = assert_ok!(engine.ensure_local_data_accessibility().await);
    assert_eq!(stats.completion_count, 3);
    assert_eq!(stats.unsynced_count, 2);

    // Legacy key kept verbatim, still found by title
    assert!(engine.is_completed("plan-1", "w1-d1", "Fingerboard Max Hangs (Crimps)").await);

    let silent_feet = engine
        .find_completion("plan-1", "w1-d1", "Silent Feet")
        .await
        .expect("title-only legacy record should be keyed");
    assert_eq!(silent_feet.completion_key.as_str(), "plan-1::w1-d1::ex:silent-feet");

    let ladders = engine
        .find_completion("plan-1", "w1-d2", "Campus Ladders")
        .await
        .expect("untagged legacy record should be keyed from its exercise id");
    assert_eq!(ladders.display_title, "Campus Ladders");
    assert_eq!(ladders.completion_key.as_str(), "plan-1::w1-d2::ex:campus-ladders");
}

#[tokio::test]
async fn test_migration_drops_older_duplicate_keys() {
    let (_dir, path) = temp_db();
    seed_version_1(&path).await;
    {
        let pool = SqlitePool::connect_with(SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO exercise_tracking (id, plan_id, session_id, exercise_id, date, notes)
             VALUES ('6c1f7a5e-0c55-4f7e-9a43-7f0f1b6a0004', 'plan-1', 'w1-d1',
                     'fingerboard-max-hangs-crimps', '2024-03-02T09:30:00+00:00',
                     '[KEY:plan-1::w1-d1::fingerboard max hangs] second entry')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let store = open_store(&path).await;
    let records = store.completions("plan-1").await;
    let keyed: Vec<_> = records
        .iter()
        .filter(|r| r.completion_key.as_str() == "plan-1::w1-d1::fingerboard max hangs")
        .collect();
    assert_eq!(keyed.len(), 1);
    assert_eq!(keyed[0].notes, "second entry");
}

#[tokio::test]
async fn test_key_only_legacy_record_is_found_and_replaced() {
    let (_dir, path) = temp_db();
    seed_version_1(&path).await;
    {
        let pool = SqlitePool::connect_with(SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO exercise_tracking (id, plan_id, session_id, exercise_id, date, notes)
             VALUES ('6c1f7a5e-0c55-4f7e-9a43-7f0f1b6a0005', 'plan-1', 'w3-d1',
                     'local-legacy', '2024-03-05T09:30:00+00:00',
                     '[KEY:plan-1::w3-d1::fingerboard max hangs] ok')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let server = MockServer::start().await;
    let engine = engine_with(
        open_store(&path).await,
        std::sync::Arc::new(http_transport(&server)),
        NetworkStatus::Offline,
    );
    assert_ok!(engine.ensure_local_data_accessibility().await);

    let legacy = engine
        .find_completion("plan-1", "w3-d1", "Fingerboard Max Hangs")
        .await
        .expect("key-only legacy record should be found by title");
    assert_eq!(legacy.display_title, "fingerboard max hangs");
    assert_eq!(
        legacy.completion_key.as_str(),
        "plan-1::w3-d1::fingerboard max hangs"
    );
    assert_eq!(legacy.notes, "ok");

    let stored = assert_ok!(
        engine
            .record_completion(CompletionRequest::new("plan-1", "w3-d1", "Fingerboard Max Hangs"))
            .await
    );
    assert_eq!(stored.id, legacy.id);

    let session: Vec<_> = engine
        .completions("plan-1")
        .await
        .into_iter()
        .filter(|r| r.session_id == "w3-d1")
        .collect();
    assert_eq!(session.len(), 1);
    assert_eq!(
        session[0].completion_key.as_str(),
        "plan-1::w3-d1::ex:fingerboard-max-hangs-crimps"
    );
}
