//! Trainlog - Offline Completion Sync
//!
//! Trainlog records which exercises of a training plan were completed, keeps
//! those records durable on the device, and pushes them to the training server
//! once connectivity allows.
//!
//! # Module Structure
//!
//! - **`library`** - The canonical exercise catalog, grouped by category
//! - **`resolver`** - Maps free-text exercise titles onto catalog entries
//!   through an ordered chain of matching strategies
//! - **`tracking`** - Session and completion records, completion key
//!   derivation and the legacy notes-tag parser
//! - **`local_db`** - SQLite-backed durable store, scoped by plan id
//! - **`sync`** - Sync engine, remote transport and network monitor
//! - **`shared`** - Configuration and error types
//!
//! # Usage
//!
//! ```rust,no_run
//! use trainlog::shared::config::AppConfig;
//! use trainlog::sync::{CompletionRequest, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::open(&AppConfig::load(None)?).await?;
//!
//! // Offline: only touches the local store
//! engine
//!     .record_completion(CompletionRequest::new("plan-1", "w1-d2", "Do the Campus Board Drill"))
//!     .await?;
//!
//! // Later, when the app decides it is a good moment
//! let report = engine.force_complete_sync().await;
//! println!("{} synced, {} failed", report.synced, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - Resolution misses and unknown plan ids are `None` / empty, not errors
//! - Persistence failures come back as `StoreError` from mutating calls
//! - Delivery failures never escape a sync pass; they are stored per record

/// Canonical exercise catalog
pub mod library;

/// Local durable store
pub mod local_db;

/// Exercise identity resolution
pub mod resolver;

/// Configuration and error types
pub mod shared;

/// Offline-first sync engine
pub mod sync;

/// Tracking records and completion keys
pub mod tracking;
