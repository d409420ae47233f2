//! JSON-backed store with atomic saves and legacy text-file migration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::envelope::{DataStore, KeyData, WeaponData};
use crate::{Result, StorageError};

/// Advisory cache lifetime used by callers deciding whether to refresh.
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

const DATA_FILE: &str = "data.json";
const BACKUP_FILE: &str = "data.json.bak";
const TEMP_FILE: &str = "data.json.tmp";
const LEGACY_WEAPONS_FILE: &str = "weapons.txt";
const LEGACY_KEYS_FILE: &str = "keys.txt";

/// Value recorded as catalogue provenance after a legacy import.
const MIGRATED_SOURCE: &str = "migrated_from_txt";

/// Owns the persisted envelope for one runtime directory.
///
/// Only one logical save runs at a time per process; sharing a runtime
/// directory between concurrent processes is unsupported.
pub struct Store {
    runtime_dir: PathBuf,
    data: DataStore,
}

impl Store {
    /// Load the envelope from `runtime_dir`, degrading to an empty one.
    ///
    /// A missing file is normal on first run. An unreadable or corrupt
    /// file is logged as a warning and replaced in memory with a fresh
    /// envelope; nothing on disk is touched until the next save.
    pub async fn load(runtime_dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = runtime_dir.into();
        let data_file = runtime_dir.join(DATA_FILE);

        let data = match tokio::fs::read(&data_file).await {
            Ok(bytes) => match serde_json::from_slice::<DataStore>(&bytes) {
                Ok(data) => {
                    debug!("Loaded cache from {}", data_file.display());
                    data
                }
                Err(e) => {
                    warn!(
                        "Failed to parse {}: {e}, starting with an empty cache",
                        data_file.display()
                    );
                    DataStore::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}, starting fresh", data_file.display());
                DataStore::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read {}: {e}, starting with an empty cache",
                    data_file.display()
                );
                DataStore::default()
            }
        };

        Self { runtime_dir, data }
    }

    /// Path of the envelope file.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.runtime_dir.join(DATA_FILE)
    }

    /// The in-memory envelope.
    #[must_use]
    pub fn data(&self) -> &DataStore {
        &self.data
    }

    /// Catalogue identifiers currently held.
    #[must_use]
    pub fn weapons(&self) -> &[String] {
        &self.data.weapons.weapons
    }

    /// Key map currently held.
    #[must_use]
    pub fn keys(&self) -> &HashMap<String, String> {
        &self.data.keys.keys
    }

    /// Record the configuration active for the next save.
    pub fn set_config_snapshot(&mut self, snapshot: serde_json::Value) {
        self.data.config_snapshot = snapshot;
    }

    /// Advisory staleness signal; the store never evicts on its own.
    #[must_use]
    pub fn is_expired(&self, max_age_hours: i64) -> bool {
        self.data.is_expired(max_age_hours)
    }

    /// Persist the envelope atomically, keeping one backup generation.
    ///
    /// The previous file (if any) is copied to `data.json.bak`, then the
    /// new envelope is written to a temp file and renamed into place so a
    /// crash mid-save never leaves a truncated envelope.
    ///
    /// # Errors
    /// Fails when the directory cannot be created or any write fails.
    pub async fn save(&mut self) -> Result<()> {
        self.data.cache.touch();

        tokio::fs::create_dir_all(&self.runtime_dir).await?;

        let data_file = self.data_file();
        if tokio::fs::metadata(&data_file).await.is_ok() {
            let backup = self.runtime_dir.join(BACKUP_FILE);
            tokio::fs::copy(&data_file, &backup).await?;
            debug!("Backed up previous cache to {}", backup.display());
        }

        let json = serde_json::to_vec_pretty(&self.data)?;
        let temp = self.runtime_dir.join(TEMP_FILE);
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &data_file).await?;

        info!("Saved cache to {}", data_file.display());
        Ok(())
    }

    /// Replace the catalogue section and persist.
    ///
    /// # Errors
    /// Fails with [`StorageError::EmptyInput`] when `weapons` is empty,
    /// before any state is modified. A failed fetch upstream must not be
    /// able to wipe a previously good catalogue.
    pub async fn save_weapons(
        &mut self,
        weapons: Vec<String>,
        source_asset: Option<String>,
        filtered: bool,
    ) -> Result<()> {
        if weapons.is_empty() {
            return Err(StorageError::empty_input("weapon list"));
        }

        let count = weapons.len();
        self.data.weapons = WeaponData::new(weapons, source_asset, filtered);
        self.save().await?;

        info!("Saved {count} weapons to cache");
        Ok(())
    }

    /// Replace the key section and persist.
    ///
    /// # Errors
    /// Fails with [`StorageError::EmptyInput`] when `keys` is empty,
    /// before any state is modified.
    pub async fn save_keys(
        &mut self,
        keys: HashMap<String, String>,
        validation_enabled: bool,
    ) -> Result<()> {
        if keys.is_empty() {
            return Err(StorageError::empty_input("key map"));
        }

        let count = keys.len();
        self.data.keys = KeyData::new(keys, validation_enabled);
        self.save().await?;

        info!("Saved {count} keys to cache");
        Ok(())
    }

    /// Import the old line-oriented text files from the runtime directory.
    pub async fn migrate_legacy(&mut self) -> Result<bool> {
        let weapons_file = self.runtime_dir.join(LEGACY_WEAPONS_FILE);
        let keys_file = self.runtime_dir.join(LEGACY_KEYS_FILE);
        self.migrate_legacy_from(&weapons_file, &keys_file).await
    }

    /// Import legacy weapon and key files from explicit paths.
    ///
    /// The weapons file holds one identifier per line; the keys file holds
    /// `identifier key` split on the first space. Blank lines and `#`
    /// comments are skipped in both, and the legacy files are left in
    /// place. Returns whether anything was imported; missing files import
    /// nothing and are not an error.
    ///
    /// # Errors
    /// Fails only when persisting imported data fails.
    pub async fn migrate_legacy_from(
        &mut self,
        weapons_file: &Path,
        keys_file: &Path,
    ) -> Result<bool> {
        let mut migrated = false;

        match tokio::fs::read_to_string(weapons_file).await {
            Ok(text) => {
                let weapons: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(ToOwned::to_owned)
                    .collect();

                if !weapons.is_empty() {
                    info!(
                        "Migrated {} weapons from {}",
                        weapons.len(),
                        weapons_file.display()
                    );
                    self.data.weapons =
                        WeaponData::new(weapons, Some(MIGRATED_SOURCE.to_string()), true);
                    migrated = true;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read {}: {e}", weapons_file.display()),
        }

        match tokio::fs::read_to_string(keys_file).await {
            Ok(text) => {
                let mut keys = HashMap::new();
                for line in text.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((name, key)) = line.split_once(' ') {
                        keys.insert(name.to_string(), key.to_string());
                    }
                }

                if !keys.is_empty() {
                    info!("Migrated {} keys from {}", keys.len(), keys_file.display());
                    let validation_enabled = self.data.keys.validation_enabled;
                    self.data.keys = KeyData::new(keys, validation_enabled);
                    migrated = true;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read {}: {e}", keys_file.display()),
        }

        if migrated {
            self.save().await?;
        }

        Ok(migrated)
    }

    /// Reset the envelope to empty and persist the reset.
    ///
    /// # Errors
    /// Fails when the save fails.
    pub async fn clear(&mut self) -> Result<()> {
        self.data = DataStore::default();
        self.save().await?;
        info!("Cleared all cached data");
        Ok(())
    }

    /// Snapshot of counts and timestamps for reporting.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            weapon_count: self.data.weapons.count,
            source_asset: self.data.weapons.source_asset.clone(),
            blacklist_applied: self.data.weapons.blacklist_applied,
            key_count: self.data.keys.count,
            validation_enabled: self.data.keys.validation_enabled,
            created_at: self.data.cache.created_at,
            updated_at: self.data.cache.updated_at,
            version: self.data.cache.version.clone(),
            expired: self.is_expired(DEFAULT_MAX_AGE_HOURS),
        }
    }
}

/// Point-in-time view of the store for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Catalogue size
    pub weapon_count: usize,
    /// Asset the catalogue came from
    pub source_asset: Option<String>,
    /// Whether the blacklist was applied
    pub blacklist_applied: bool,
    /// Number of cached keys
    pub key_count: usize,
    /// Whether validation was on when keys were fetched
    pub validation_enabled: bool,
    /// Envelope creation time
    pub created_at: DateTime<Utc>,
    /// Last save time
    pub updated_at: DateTime<Utc>,
    /// Schema version that wrote the envelope
    pub version: String,
    /// Whether the envelope is past the default advisory age
    pub expired: bool,
}
