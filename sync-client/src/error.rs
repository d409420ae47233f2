//! Error types for the sync-client crate

use thiserror::Error;

/// Result type for key exchange operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error types for key exchange operations
#[derive(Debug, Error)]
pub enum SyncError {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server-side condition worth retrying (HTTP 429 or 5xx)
    #[error("Transient HTTP status: {status}")]
    TransientStatus { status: u16 },

    /// Transient condition signalled in the response result field
    #[error("Transient server result code: {code}")]
    TransientResult { code: u32 },

    /// Non-success HTTP status that is not worth retrying
    #[error("Unexpected HTTP status: {status}")]
    UnexpectedStatus { status: u16 },

    // Protocol errors
    /// result=100, the session or device identity was rejected
    #[error("Authentication rejected by key server (result=100)")]
    Authentication,

    #[error("Response shorter than the {expected}-byte length prefix: {length} bytes")]
    ResponseTooShort { length: usize, expected: usize },

    #[error("Malformed response: {0}")]
    InvalidResponse(String),

    // Codec errors
    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),
}

impl SyncError {
    /// Create a malformed response error
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse(reason.into())
    }

    /// Create a compression error
    pub fn compression(reason: impl Into<String>) -> Self {
        Self::Compression(reason.into())
    }

    /// Create a decompression error
    pub fn decompression(reason: impl Into<String>) -> Self {
        Self::Decompression(reason.into())
    }

    /// Whether the retry policy may attempt this error again.
    ///
    /// Connection, timeout, and request-transport failures are transient,
    /// as are server-signalled transient conditions. Authentication
    /// rejections and malformed responses are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::TransientStatus { .. } | Self::TransientResult { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::TransientStatus { status: 503 }.is_transient());
        assert!(SyncError::TransientResult { code: 429 }.is_transient());
        assert!(!SyncError::Authentication.is_transient());
        assert!(!SyncError::invalid_response("garbage").is_transient());
        assert!(!SyncError::UnexpectedStatus { status: 404 }.is_transient());
    }
}
