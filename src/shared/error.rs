//! Shared Error Types
//!
//! Error types for the pieces of the crate that can actually fail. Resolution
//! misses and unknown plan ids are not errors; they come back as `None` or an
//! empty collection.
//!
//! # Error Categories
//!
//! - `StoreError` - local durable store failures (surfaced to the caller)
//! - `TransportError` - remote delivery failures (captured per record by the sync engine)
//! - `LibraryError` - malformed exercise catalog definitions
//! - `SetupError` - anything that stops the engine from being assembled
//!
//! Configuration errors live next to the config types in `shared::config`.
//!
//! # Usage
//!
//! ```rust
//! use trainlog::shared::error::StoreError;
//!
//! let error = StoreError::corrupt_record("exercise_tracking", "bad timestamp");
//! assert!(error.to_string().contains("exercise_tracking"));
//! ```
use crate::shared::config::ConfigError;
use thiserror::Error;

/// Local durable store failures.
///
/// A mutation that returns one of these has already been applied in memory;
/// only the flush to disk failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure while reading or flushing
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be turned back into a record
    #[error("Corrupt record in '{table}': {message}")]
    CorruptRecord {
        /// Table the row came from
        table: String,
        /// Human-readable error message
        message: String,
    },

    /// Filesystem failure while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a new corrupt-record error
    pub fn corrupt_record(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Remote delivery failures.
///
/// The sync engine never returns these from a pass; it stores
/// [`TransportError::diagnostic`] on the record that failed.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// Connection, DNS, TLS or timeout failure
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Credentials were rejected even after one refresh
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// Request or response body could not be encoded/decoded
    #[error("Payload error: {message}")]
    Payload {
        /// Human-readable error message
        message: String,
    },
}

/// Longest diagnostic stored on a record.
const MAX_DIAGNOSTIC_LEN: usize = 200;

impl TransportError {
    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create a new unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new payload error
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    /// Short single-line description suitable for `sync_error`.
    pub fn diagnostic(&self) -> String {
        let text = self.to_string().replace(['\n', '\r'], " ");
        if text.chars().count() <= MAX_DIAGNOSTIC_LEN {
            return text;
        }
        let mut short: String = text.chars().take(MAX_DIAGNOSTIC_LEN).collect();
        short.push('…');
        short
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("request timed out: {}", err))
        } else if err.is_decode() || err.is_body() {
            Self::payload(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::payload(format!("JSON error: {}", err))
    }
}

/// Exercise catalog failures.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Catalog text is not valid TOML for the expected shape
    #[error("Catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two exercises share a name inside one category
    #[error("Duplicate exercise '{name}' in category '{category}'")]
    DuplicateExercise {
        /// Category name
        category: String,
        /// Exercise name
        name: String,
    },

    /// A category or exercise has an empty name
    #[error("Empty name in category '{category}'")]
    EmptyName {
        /// Category name (may itself be empty)
        category: String,
    },
}

/// Failures while wiring up the engine from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
