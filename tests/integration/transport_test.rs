//! HTTP transport tests
//!
//! Bearer tokens, the refresh-once-on-401 rule and status pass-through.

use crate::common::*;
use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trainlog::shared::error::TransportError;
use trainlog::sync::transport::{CredentialProvider, HttpMethod, RemoteTransport};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRACKING_PATH: &str = "/api/plans/plan-1/exercise-tracking";

/// Hands out "stale" until refreshed, then "fresh".
#[derive(Debug)]
struct RotatingToken {
    current: Mutex<String>,
    refreshes: AtomicUsize,
}

impl RotatingToken {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new("stale".to_string()),
            refreshes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CredentialProvider for RotatingToken {
    async fn token(&self) -> Option<String> {
        Some(self.current.lock().unwrap().clone())
    }

    async fn refresh(&self) -> bool {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = "fresh".to_string();
        true
    }
}

async fn mount_unauthorized(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TRACKING_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, db) = temp_db();
    let config = trainlog::shared::config::AppConfig::builder()
        .server_url(server.uri())
        .database_path(db)
        .api_token("secret")
        .build()
        .unwrap();
    let transport = trainlog::sync::HttpTransport::new(&config).unwrap();

    let response = assert_ok!(transport.send(HttpMethod::Get, "/api/health", None).await);
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_refresh_once_then_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRACKING_PATH))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_unauthorized(&server).await;

    let credentials = RotatingToken::new();
    let transport = http_transport(&server).with_credentials(credentials.clone());

    let response = assert_ok!(
        transport
            .send(HttpMethod::Post, TRACKING_PATH, Some(json!({ "id": "x" })))
            .await
    );
    assert_eq!(response.status, 200);
    assert_eq!(credentials.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unauthorized_after_refresh() {
    let server = MockServer::start().await;
    mount_unauthorized(&server).await;

    let credentials = RotatingToken::new();
    let transport = http_transport(&server).with_credentials(credentials.clone());

    let result = transport
        .send(HttpMethod::Post, TRACKING_PATH, Some(json!({})))
        .await;
    assert_matches!(result, Err(TransportError::Unauthorized { .. }));
    assert_eq!(credentials.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_static_token_does_not_retry() {
    let server = MockServer::start().await;
    mount_unauthorized(&server).await;

    let result = http_transport(&server)
        .send(HttpMethod::Post, TRACKING_PATH, Some(json!({})))
        .await;
    match result {
        Err(TransportError::Unauthorized { message }) => assert_eq!(message, "token expired"),
        other => panic!("Expected Unauthorized, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_status_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRACKING_PATH))
        .respond_with(ResponseTemplate::new(422).set_body_string("missing completionKey"))
        .mount(&server)
        .await;

    let response = assert_ok!(
        http_transport(&server)
            .send(HttpMethod::Post, TRACKING_PATH, Some(json!({})))
            .await
    );
    assert!(!response.is_success());
    let err = response.error_for_status().unwrap_err();
    assert_eq!(err.to_string(), "HTTP 422: missing completionKey");
}

#[tokio::test]
async fn test_refresh_applies_to_sync_pass() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRACKING_PATH))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_unauthorized(&server).await;

    let transport = http_transport(&server).with_credentials(RotatingToken::new());
    let engine = engine_with(
        memory_store().await,
        Arc::new(transport),
        trainlog::sync::NetworkStatus::Online,
    );
    assert_ok!(
        engine
            .record_completion(trainlog::sync::CompletionRequest::new(
                "plan-1",
                "s-1",
                "Joint Mobility Circuit"
            ))
            .await
    );

    let report = engine.force_complete_sync().await;
    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 0);
}
