//! Error types for asset download operations

use thiserror::Error;

/// Result type for download operations
pub type Result<T> = std::result::Result<T, CdnError>;

/// Error types for download operations
#[derive(Error, Debug)]
pub enum CdnError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Asset not present on the data host
    #[error("Asset not found: {name}")]
    AssetNotFound {
        /// Identifier that was requested
        name: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// Downloaded data failed the container check
    #[error("Validation failed for {name}: {reason}")]
    Validation {
        /// Identifier that failed validation
        name: String,
        /// What the check found
        reason: String,
    },

    /// Invalid response from the data host
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Reason for the invalid response
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CdnError {
    /// Create an asset not found error
    pub fn asset_not_found(name: impl Into<String>) -> Self {
        Self::AssetNotFound { name: name.into() }
    }

    /// Create a rate limited error
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    /// Create a validation error
    pub fn validation(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }
}
