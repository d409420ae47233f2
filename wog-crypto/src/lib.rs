//! Decryption support for World of Guns weapon assets.
//!
//! This crate provides:
//! - Per-asset key derivation (MD5 of the sync key plus the fixed game salt)
//! - A repeating-keystream XOR cipher that stays continuous across chunks
//! - The container-reader boundary used to pull encrypted payloads out of
//!   downloaded bundles
//! - Idempotent per-asset and batch decryption to disk

pub mod container;
pub mod derive;
pub mod error;
pub mod extract;
pub mod xor;

pub use container::{ContainerReader, ContainerRecord, RecordKind};
pub use derive::{KEY_SALT, derive_key};
pub use error::CryptoError;
pub use extract::{CATALOGUE_RECORD, Decryptor, INDEX_ASSET_FILE, extract_catalogue};
pub use xor::{XorCipher, XorReader};

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
