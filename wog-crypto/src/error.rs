//! Error types for wog-crypto operations.

use thiserror::Error;

/// Errors that can occur during decryption operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Cipher key material was empty.
    #[error("cipher key must not be empty")]
    EmptyKey,

    /// Container reader failed to parse an asset.
    #[error("container parse failed: {0}")]
    Container(String),

    /// A required container record was not found.
    #[error("container record not found: {name}")]
    RecordNotFound { name: String },

    /// Catalogue extraction produced no identifiers.
    #[error("catalogue record contained no identifiers")]
    EmptyCatalogue,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Create a container parse error.
    pub fn container(reason: impl Into<String>) -> Self {
        Self::Container(reason.into())
    }

    /// Create a record-not-found error.
    pub fn record_not_found(name: impl Into<String>) -> Self {
        Self::RecordNotFound { name: name.into() }
    }
}
