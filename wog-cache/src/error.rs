//! Error types for the wog-cache crate

use thiserror::Error;

/// Result type for cache storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Error types for cache storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Refused to replace cached data with an empty collection
    #[error("Cannot save empty {0}")]
    EmptyInput(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Create an empty-input error naming the rejected collection
    pub fn empty_input(what: impl Into<String>) -> Self {
        Self::EmptyInput(what.into())
    }
}
