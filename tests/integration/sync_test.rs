//! Sync engine tests against a mock training server

use crate::common::*;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use trainlog::sync::{CompletionRequest, NetworkStatus, SkipReason};
use trainlog::tracking::RecordState;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TITLES: [&str; 4] = [
    "Fingerboard Repeaters",
    "Campus Ladders",
    "Weighted Pull-Ups",
    "Cool-Down Stretching",
];

#[tokio::test]
async fn test_all_records_sync_in_one_pass() {
    let server = MockServer::start().await;
    mount_tracking(&server, 200).await;
    let engine = http_engine(&server, memory_store().await);

    for title in TITLES {
        assert_ok!(
            engine
                .record_completion(CompletionRequest::new("plan-1", "w2-d3", title))
                .await
        );
    }
    assert_status!(engine.get_sync_status("plan-1").await, synced: 0, failed: 0, pending: 4);

    let report = engine.force_complete_sync().await;
    assert_eq!(report.attempted, 4);
    assert_eq!(report.synced, 4);
    assert_eq!(report.failed, 0);
    assert_status!(engine.get_sync_status("plan-1").await, synced: 4, failed: 0, pending: 0);

    for record in engine.completions("plan-1").await {
        assert!(record.sync_error.is_none());
        assert!(record.last_sync_attempt.is_some());
    }
}

#[tokio::test]
async fn test_wire_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plans/plan-9/exercise-tracking"))
        .and(body_partial_json(json!({
            "planId": "plan-9",
            "sessionId": "s-1",
            "exerciseId": "campus-board-exercises",
            "completionKey": "plan-9::s-1::ex:campus-board-exercises",
            "exerciseTitle": "Do the Campus Board Drill",
            "notes": "1-4-7",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let engine = http_engine(&server, memory_store().await);
    assert_ok!(
        engine
            .record_completion(
                CompletionRequest::new("plan-9", "s-1", "Do the Campus Board Drill")
                    .with_notes("1-4-7")
            )
            .await
    );

    let report = engine.force_complete_sync().await;
    assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(TRACKING_PATH_PATTERN))
        .and(body_partial_json(json!({ "exerciseTitle": "Campus Ladders" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is locked"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_tracking(&server, 200).await;

    let engine = http_engine(&server, memory_store().await);
    for title in TITLES {
        assert_ok!(
            engine
                .record_completion(CompletionRequest::new("plan-1", "w2-d3", title))
                .await
        );
    }

    let report = engine.force_complete_sync().await;
    assert_eq!(report.synced, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(tracking_posts(&server).await.len(), 4);
    assert_status!(engine.get_sync_status("plan-1").await, synced: 3, failed: 1, pending: 0);

    let failed = engine
        .find_completion("plan-1", "w2-d3", "Campus Ladders")
        .await
        .expect("failed record should still exist");
    assert!(!failed.is_synced);
    let error = failed.sync_error.expect("sync_error should be set");
    assert_contains!(error, "HTTP 500");
    assert_contains!(error, "database is locked");
    assert!(failed.last_sync_attempt.is_some());
}

#[tokio::test]
async fn test_failed_record_retried_next_pass() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(TRACKING_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_tracking(&server, 200).await;

    let engine = http_engine(&server, memory_store().await);
    assert_ok!(
        engine
            .record_completion(CompletionRequest::new("plan-1", "s-1", "Linked Circuits"))
            .await
    );

    let first = engine.force_complete_sync().await;
    assert_eq!(first.failed, 1);
    assert_eq!(
        engine.completion_state("plan-1", "s-1", "Linked Circuits").await,
        Some(RecordState::Failed)
    );

    let second = engine.force_complete_sync().await;
    assert_eq!(second.synced, 1);
    assert_eq!(
        engine.completion_state("plan-1", "s-1", "Linked Circuits").await,
        Some(RecordState::Synced)
    );
    let record = engine
        .find_completion("plan-1", "s-1", "Linked Circuits")
        .await
        .unwrap();
    assert!(record.sync_error.is_none());
}

#[tokio::test]
async fn test_duplicate_offline_completions_post_once() {
    let server = MockServer::start().await;
    mount_tracking(&server, 200).await;
    let engine = http_engine(&server, memory_store().await);
    engine.monitor().set_status(NetworkStatus::Offline);

    assert_ok!(
        engine
            .record_completion(CompletionRequest::new("plan-1", "s-1", "Fingerboard Max Hangs"))
            .await
    );
    assert_ok!(
        engine
            .record_completion(CompletionRequest::new("plan-1", "s-1", "Max Hangs"))
            .await
    );
    let offline = engine.force_complete_sync().await;
    assert_matches!(offline.skipped, Some(SkipReason::Offline));
    assert!(tracking_posts(&server).await.is_empty());

    engine.monitor().set_status(NetworkStatus::Online);
    let report = engine.force_complete_sync().await;
    assert_eq!(report.synced, 1);

    let posts = tracking_posts(&server).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0]["completionKey"],
        "plan-1::s-1::ex:fingerboard-max-hangs-crimps"
    );
}

#[tokio::test]
async fn test_plans_are_synced_independently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plans/plan-b/exercise-tracking"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_tracking(&server, 200).await;

    let engine = http_engine(&server, memory_store().await);
    for plan in ["plan-a", "plan-b", "plan-c"] {
        for title in ["Easy Traversing", "4x4 Boulders"] {
            assert_ok!(
                engine
                    .record_completion(CompletionRequest::new(plan, "s-1", title))
                    .await
            );
        }
    }

    let report = engine.force_complete_sync().await;
    assert_eq!(report.plans, 3);
    assert_eq!(report.synced, 4);
    assert_eq!(report.failed, 2);
    assert!(report.failures.iter().all(|f| f.plan_id == "plan-b"));
    assert_status!(engine.get_sync_status("plan-a").await, synced: 2, failed: 0, pending: 0);
    assert_status!(engine.get_sync_status("plan-b").await, synced: 0, failed: 2, pending: 0);
    assert_status!(engine.overall_sync_status().await, synced: 4, failed: 2, pending: 0);
}

#[tokio::test]
async fn test_concurrent_pass_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(TRACKING_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let engine = http_engine(&server, memory_store().await);
    assert_ok!(
        engine
            .record_completion(CompletionRequest::new("plan-1", "s-1", "Route Intervals"))
            .await
    );

    let (first, second) = tokio::join!(engine.force_complete_sync(), engine.force_complete_sync());
    assert_eq!(first.synced, 1);
    assert_matches!(second.skipped, Some(SkipReason::AlreadyRunning));

    let state = engine.sync_state().await;
    assert!(!state.is_syncing);
    assert!(state.last_sync.is_some());
    assert_eq!(state.last_report.map(|r| r.synced), Some(1));

    let metrics = engine.metrics().await;
    assert_eq!(metrics.total_passes, 1);
    assert_eq!(metrics.skipped_passes, 1);
}

#[tokio::test]
async fn test_unreachable_server_marks_monitor_offline() {
    let server = MockServer::start().await;
    let transport = http_transport(&server);
    drop(server);

    let engine = engine_with(
        memory_store().await,
        std::sync::Arc::new(transport),
        NetworkStatus::Online,
    );
    assert_ok!(
        engine
            .record_completion(CompletionRequest::new("plan-1", "s-1", "Downclimbing"))
            .await
    );

    let report = engine.force_complete_sync().await;
    assert_eq!(report.failed, 1);
    assert_contains!(report.failures[0].error, "Network error");
    assert_eq!(engine.monitor().status(), NetworkStatus::Offline);
    assert_status!(engine.get_sync_status("plan-1").await, synced: 0, failed: 1, pending: 0);
}

#[tokio::test]
async fn test_connectivity_probe() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    let engine = http_engine(&server, memory_store().await);
    engine.monitor().set_status(NetworkStatus::Offline);

    let (online, message) = engine.test_server_connectivity().await;
    assert!(online);
    assert_contains!(message, "Connected");
    assert_eq!(engine.monitor().status(), NetworkStatus::Online);
}

#[tokio::test]
async fn test_connectivity_probe_unhealthy_server() {
    let server = MockServer::start().await;
    mount_health(&server, 503).await;
    let engine = http_engine(&server, memory_store().await);

    let (online, message) = engine.test_server_connectivity().await;
    assert!(!online);
    assert_contains!(message, "503");
    assert_eq!(engine.monitor().status(), NetworkStatus::Limited);
}

#[tokio::test]
async fn test_probe_task_publishes_transitions() {
    let server = MockServer::start().await;
    mount_health(&server, 200).await;
    let engine = http_engine(&server, memory_store().await);
    engine.monitor().set_status(NetworkStatus::Offline);
    let mut status = engine.monitor().subscribe();

    let probe = engine
        .monitor()
        .spawn_probe(engine.transport().clone(), Duration::from_millis(50));
    tokio::time::timeout(Duration::from_secs(5), status.changed())
        .await
        .expect("probe should publish within the timeout")
        .expect("monitor dropped");
    assert_eq!(*status.borrow(), NetworkStatus::Online);
    probe.abort();
}
