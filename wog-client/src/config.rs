//! Runtime configuration for the pipeline.

use std::collections::BTreeSet;
use std::path::PathBuf;

use sync_client::RequestProfile;

/// Default number of concurrent network operations.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Largest accepted concurrency setting.
pub const MAX_CONCURRENCY: usize = 16;

/// Default pause between download batches in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 500;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout in seconds, sized for large asset bodies.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default retry budget for transient network failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Weapons the publisher ships but the endpoint never issues keys for.
const WEAPON_BLACKLIST: [&str; 7] = [
    "hk_g28",
    "drag_racing",
    "tac_50",
    "zis_tmp",
    "groza_1",
    "glock_19x",
    "cat_349f",
];

/// Range texture bundles that carry no weapon payload.
const TEXTURE_BLACKLIST_PREFIX: &str = "shooting_";
const TEXTURE_BLACKLIST_COUNT: u32 = 10;

/// Configuration for one pipeline run.
///
/// Values are plain data; nothing here reads the environment or global
/// state. The CLI builds one from its flags and hands it to the
/// [`crate::pipeline::Coordinator`].
#[derive(Debug, Clone)]
pub struct WogConfig {
    /// Base directory all derived paths hang off
    pub base_dir: PathBuf,
    /// Base URL of the asset data host
    pub data_url: String,
    /// URL of the key exchange endpoint
    pub api_url: String,
    /// Concurrent network operations (1..=16)
    pub concurrency: usize,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Retry budget for transient network failures
    pub max_retries: u32,
    /// Assets per polite download batch
    pub batch_size: usize,
    /// Pause between download batches in milliseconds
    pub batch_delay_ms: u64,
    /// Streaming decrypt read size in bytes
    pub chunk_size: usize,
    /// Advisory cache age in hours before a catalogue refresh
    pub expiry_hours: i64,
    /// Whether per-item failures fail the whole run
    pub strict: bool,
    /// Credential and version fields replayed to the key endpoint
    pub profile: RequestProfile,
    /// Weapon identifiers excluded from the catalogue
    pub weapon_blacklist: Vec<String>,
    /// Texture identifiers excluded from the catalogue
    pub texture_blacklist: Vec<String>,
}

impl WogConfig {
    /// Create a configuration rooted at `base_dir` with stock defaults.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            data_url: wog_cdn::DEFAULT_DATA_URL.to_string(),
            api_url: sync_client::DEFAULT_API_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            batch_size: wog_cdn::DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            chunk_size: wog_crypto::extract::DEFAULT_CHUNK_SIZE,
            expiry_hours: wog_cache::DEFAULT_MAX_AGE_HOURS,
            strict: false,
            profile: RequestProfile::default(),
            weapon_blacklist: WEAPON_BLACKLIST.iter().map(ToString::to_string).collect(),
            texture_blacklist: (1..=TEXTURE_BLACKLIST_COUNT)
                .map(|i| format!("{TEXTURE_BLACKLIST_PREFIX}{i:02}"))
                .collect(),
        }
    }

    /// Set the data host URL.
    #[must_use]
    pub fn with_data_url(mut self, data_url: impl Into<String>) -> Self {
        self.data_url = data_url.into();
        self
    }

    /// Set the key exchange endpoint URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Set the concurrency, clamped to the supported range.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Set the connection and request timeouts in seconds.
    #[must_use]
    pub fn with_timeouts(mut self, connect_secs: u64, request_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.request_timeout_secs = request_secs;
        self
    }

    /// Set the retry budget for transient network failures.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the download batch size (floor of one).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the pause between download batches.
    #[must_use]
    pub fn with_batch_delay_ms(mut self, batch_delay_ms: u64) -> Self {
        self.batch_delay_ms = batch_delay_ms;
        self
    }

    /// Set strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the request profile replayed to the key endpoint.
    #[must_use]
    pub fn with_profile(mut self, profile: RequestProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Directory raw downloads land in.
    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.base_dir.join("assets")
    }

    /// Directory extracted encrypted payloads land in.
    #[must_use]
    pub fn encrypted_dir(&self) -> PathBuf {
        self.base_dir.join("encrypted")
    }

    /// Directory decrypted outputs land in.
    #[must_use]
    pub fn decrypted_dir(&self) -> PathBuf {
        self.base_dir.join("decrypted")
    }

    /// Directory the cache envelope lives in.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.base_dir.join("runtime")
    }

    /// Union of the weapon and texture blacklists.
    #[must_use]
    pub fn combined_blacklist(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .weapon_blacklist
            .iter()
            .chain(self.texture_blacklist.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Settings snapshot persisted alongside the cache envelope.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "data_url": self.data_url,
            "api_url": self.api_url,
            "concurrency": self.concurrency,
            "connect_timeout_secs": self.connect_timeout_secs,
            "request_timeout_secs": self.request_timeout_secs,
            "max_retries": self.max_retries,
            "batch_size": self.batch_size,
            "batch_delay_ms": self.batch_delay_ms,
            "chunk_size": self.chunk_size,
            "strict": self.strict,
            "game_version": self.profile.game_version,
            "unity_version": self.profile.unity_version,
            "blacklisted": self.combined_blacklist().len(),
        })
    }
}

impl Default for WogConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_derived_paths_hang_off_base() {
        let config = WogConfig::new("/tmp/wog");
        assert_eq!(config.assets_dir(), PathBuf::from("/tmp/wog/assets"));
        assert_eq!(config.encrypted_dir(), PathBuf::from("/tmp/wog/encrypted"));
        assert_eq!(config.decrypted_dir(), PathBuf::from("/tmp/wog/decrypted"));
        assert_eq!(config.runtime_dir(), PathBuf::from("/tmp/wog/runtime"));
    }

    #[test]
    fn test_concurrency_is_clamped() {
        assert_eq!(WogConfig::default().with_concurrency(0).concurrency, 1);
        assert_eq!(WogConfig::default().with_concurrency(99).concurrency, 16);
        assert_eq!(WogConfig::default().with_concurrency(8).concurrency, 8);
    }

    #[test]
    fn test_combined_blacklist_is_a_union() {
        let combined = WogConfig::default().combined_blacklist();
        assert_eq!(combined.len(), 17);
        assert!(combined.contains(&"hk_g28".to_string()));
        assert!(combined.contains(&"shooting_01".to_string()));
        assert!(combined.contains(&"shooting_10".to_string()));
    }

    #[test]
    fn test_snapshot_carries_the_tunables() {
        let snapshot = WogConfig::default().with_strict(true).snapshot();
        assert_eq!(snapshot["strict"], serde_json::json!(true));
        assert_eq!(snapshot["batch_size"], serde_json::json!(50));
        assert_eq!(snapshot["max_retries"], serde_json::json!(3));
        assert_eq!(snapshot["game_version"], serde_json::json!("2.2.1z5"));
    }
}
