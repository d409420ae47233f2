//! Container-reader boundary.
//!
//! Downloaded assets are Unity bundles; parsing them is delegated to an
//! external reader implementation. This crate only consumes the records a
//! reader yields: it decrypts opaque binary payloads and reads the
//! catalogue out of the index text record. Everything else passes through
//! untouched.

use crate::Result;

/// Payload classification for a container record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// Opaque named binary payload. The encrypted weapon data lives here.
    Blob(Vec<u8>),
    /// Text payload. The catalogue index is one of these.
    Text(String),
    /// Any other record type, carried by its tag and ignored here.
    Other(String),
}

/// One named entry yielded by a container reader.
///
/// Names may be empty; such records cannot produce a stable output
/// filename and are skipped by the extraction path.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    /// Record name as stored in the container.
    pub name: String,
    /// Typed payload.
    pub kind: RecordKind,
}

impl ContainerRecord {
    /// Create a binary blob record.
    pub fn blob(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: RecordKind::Blob(data),
        }
    }

    /// Create a text record.
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RecordKind::Text(content.into()),
        }
    }
}

/// Parses raw asset bytes into the records they contain.
///
/// Implementations live outside this crate; the test suites supply their
/// own minimal stand-ins.
pub trait ContainerReader {
    /// Parse `data` and return every record found, in container order.
    ///
    /// # Errors
    /// Returns [`crate::CryptoError::Container`] when the bytes are not a
    /// readable container.
    fn read_records(&self, data: &[u8]) -> Result<Vec<ContainerRecord>>;
}
