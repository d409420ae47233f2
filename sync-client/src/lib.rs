//! Key exchange client for the World of Guns sync endpoint.
//!
//! Implements the game's key request protocol: an ordered query-string
//! body, bzip2-compressed and prefixed with its length as 4 bytes
//! little-endian, sent as an HTTP PUT; responses echo the same framing.
//! Transient failures are retried with exponential backoff, an
//! authentication rejection aborts immediately, and successful lookups
//! are cached in memory for the process lifetime.

pub mod client;
pub mod error;
pub mod response;
pub mod retry;
pub mod wire;

pub use client::{DEFAULT_API_URL, SyncClient};
pub use error::{Result, SyncError};
pub use response::{KeyOutcome, parse_response};
pub use retry::RetryPolicy;
pub use wire::RequestProfile;
