//! Download manager for the World of Guns asset host.
//!
//! Decides which remote assets are stale by comparing local file size
//! against the server-reported size, streams stale assets to temporary
//! files, validates the Unity container header before an atomic rename,
//! and processes large catalogues in polite batches with bounded
//! concurrency.

pub mod client;
pub mod error;
pub mod validate;

pub use client::{
    CdnClient, CdnClientBuilder, DEFAULT_BATCH_SIZE, DEFAULT_DATA_URL, INDEX_ASSET_FILE,
    INDEX_ASSET_PATH,
};
pub use error::{CdnError, Result};
pub use validate::MIN_ASSET_SIZE;
