//! Mock server helpers for integration tests
//!
//! Wraps wiremock with the training API's two endpoints.

use super::fixtures::engine_with;
use std::path::Path;
use std::sync::Arc;
use trainlog::local_db::LocalStore;
use trainlog::shared::config::AppConfig;
use trainlog::sync::{HttpTransport, NetworkStatus, SyncEngine};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TRACKING_PATH_PATTERN: &str = r"^/api/plans/[^/]+/exercise-tracking$";

pub fn config_for(server: &MockServer, db: &Path) -> AppConfig {
    AppConfig::builder()
        .server_url(server.uri())
        .database_path(db)
        .request_timeout_secs(5)
        .build()
        .expect("test config should be valid")
}

pub fn http_transport(server: &MockServer) -> HttpTransport {
    let config = config_for(server, Path::new("unused.db"));
    HttpTransport::new(&config).expect("Failed to build HTTP transport")
}

/// Engine over `store` talking HTTP to `server`, starting online.
pub fn http_engine(server: &MockServer, store: Arc<LocalStore>) -> SyncEngine {
    engine_with(store, Arc::new(http_transport(server)), NetworkStatus::Online)
}

pub async fn mount_health(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Every completion POST answers `status`.
pub async fn mount_tracking(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path_regex(TRACKING_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// JSON bodies of every completion POST the server has seen.
pub async fn tracking_posts(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "POST")
        .map(|request| {
            request
                .body_json::<serde_json::Value>()
                .expect("completion body should be JSON")
        })
        .collect()
}
