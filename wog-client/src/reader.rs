//! Container-reader wiring for the binary.
//!
//! Catalogue extraction and decryption consume the
//! [`wog_crypto::ContainerReader`] trait. Bundle parsing itself is an
//! external capability; this build ships without one, so the stock
//! reader reports that clearly instead of guessing at the format.
//! Embedders construct the [`crate::pipeline::Coordinator`] with their
//! own implementation.

use std::sync::Arc;

use wog_crypto::{ContainerRecord, ContainerReader, CryptoError};

/// Reader used when no bundle parser is linked into the build.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedReader;

impl ContainerReader for UnsupportedReader {
    fn read_records(&self, _data: &[u8]) -> wog_crypto::Result<Vec<ContainerRecord>> {
        Err(CryptoError::container(
            "no bundle parser is linked into this build; \
             construct the pipeline with a ContainerReader implementation",
        ))
    }
}

/// The reader the binary passes to the pipeline.
#[must_use]
pub fn default_reader() -> Arc<dyn ContainerReader + Send + Sync> {
    Arc::new(UnsupportedReader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_reader_refuses_parsing() {
        let err = UnsupportedReader.read_records(b"UnityFS").unwrap_err();
        assert!(err.to_string().contains("no bundle parser"));
    }
}
