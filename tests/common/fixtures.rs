//! Engine and store fixtures
//!
//! Builds engines over in-memory or on-disk stores with the builtin library.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use trainlog::library::ExerciseLibrary;
use trainlog::local_db::LocalStore;
use trainlog::resolver::Resolver;
use trainlog::sync::{NetworkMonitor, NetworkStatus, RemoteTransport, SyncConfig, SyncEngine};

pub fn resolver() -> Arc<Resolver> {
    let library = ExerciseLibrary::builtin().expect("builtin library should parse");
    Arc::new(Resolver::new(Arc::new(library)))
}

pub async fn memory_store() -> Arc<LocalStore> {
    Arc::new(
        LocalStore::in_memory()
            .await
            .expect("Failed to create in-memory store"),
    )
}

/// Database file inside a fresh temp directory. Keep the `TempDir` alive.
pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("trainlog.db");
    (dir, path)
}

pub async fn open_store(path: &Path) -> Arc<LocalStore> {
    Arc::new(
        LocalStore::open(path)
            .await
            .expect("Failed to open on-disk store"),
    )
}

pub fn engine_with(
    store: Arc<LocalStore>,
    transport: Arc<dyn RemoteTransport>,
    status: NetworkStatus,
) -> SyncEngine {
    SyncEngine::new(
        SyncConfig::default(),
        store,
        resolver(),
        transport,
        Arc::new(NetworkMonitor::new(status)),
    )
}
