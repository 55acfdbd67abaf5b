//! Error types for the state store.

use thiserror::Error;

/// Main error type for store operations.
///
/// Only the validation variants (`InvalidPath`, `InvalidRecord`) ever escape
/// the public API synchronously. The others are produced internally, logged,
/// and folded back into state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Invalid record in {collection}: {reason}")]
    InvalidRecord { collection: String, reason: String },

    #[error("Fetch failed for {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Listener {listener} on {path} panicked: {message}")]
    Listener {
        path: String,
        listener: u64,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

impl StoreError {
    pub(crate) fn invalid_path(path: &str, reason: &'static str) -> Self {
        StoreError::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }

    pub(crate) fn invalid_record(collection: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidRecord {
            collection: collection.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the errors a caller can fix by passing different arguments.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidPath { .. } | StoreError::InvalidRecord { .. }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
