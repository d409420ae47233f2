//! Durable local cache for World of Guns catalogue and key data.
//!
//! All persisted state lives in one JSON envelope per runtime directory:
//! the weapon catalogue, the decryption key map, cache metadata with
//! timestamps and schema version, and a snapshot of the configuration
//! active at the last save. Saves are atomic (write-to-temp then rename)
//! and keep a one-generation backup of the previous file.

pub mod envelope;
pub mod error;
pub mod store;

pub use envelope::{CacheMetadata, DataStore, KeyData, WeaponData};
pub use error::{Result, StorageError};
pub use store::{DEFAULT_MAX_AGE_HOURS, Store, StoreStats};
