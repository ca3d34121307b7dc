//! Shared Module
//!
//! Configuration and error types used across the crate.

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{LibraryError, SetupError, StoreError, TransportError};
