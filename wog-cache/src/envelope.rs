//! The persisted JSON envelope: catalogue, keys, and cache metadata.
//!
//! Every field carries a serde default so envelopes written by older
//! versions (or partially hand-edited ones) still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema version stamped into freshly created envelopes.
const SCHEMA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool name recorded as the envelope source.
const SOURCE_NAME: &str = "wog-dump";

fn default_true() -> bool {
    true
}

/// Weapon catalogue section with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponData {
    /// Item identifiers making up the catalogue
    #[serde(default)]
    pub weapons: Vec<String>,
    /// Number of identifiers at save time
    #[serde(default)]
    pub count: usize,
    /// Whether the list went through blacklist filtering
    #[serde(default = "default_true")]
    pub filtered: bool,
    /// Asset the catalogue was extracted from
    #[serde(default)]
    pub source_asset: Option<String>,
    /// Whether the blacklist was applied when the list was built
    #[serde(default = "default_true")]
    pub blacklist_applied: bool,
}

impl WeaponData {
    /// Build a catalogue section, recomputing the count.
    #[must_use]
    pub fn new(weapons: Vec<String>, source_asset: Option<String>, filtered: bool) -> Self {
        Self {
            count: weapons.len(),
            weapons,
            filtered,
            source_asset,
            blacklist_applied: filtered,
        }
    }
}

impl Default for WeaponData {
    fn default() -> Self {
        Self {
            weapons: Vec::new(),
            count: 0,
            filtered: true,
            source_asset: None,
            blacklist_applied: true,
        }
    }
}

/// Decryption key section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyData {
    /// Identifier to sync-key mapping
    #[serde(default)]
    pub keys: HashMap<String, String>,
    /// Number of keys at save time
    #[serde(default)]
    pub count: usize,
    /// Whether downloaded assets were validated when these keys were fetched
    #[serde(default = "default_true")]
    pub validation_enabled: bool,
}

impl KeyData {
    /// Build a key section, recomputing the count.
    #[must_use]
    pub fn new(keys: HashMap<String, String>, validation_enabled: bool) -> Self {
        Self {
            count: keys.len(),
            keys,
            validation_enabled,
        }
    }
}

impl Default for KeyData {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            count: 0,
            validation_enabled: true,
        }
    }
}

/// Envelope metadata: timestamps, schema version, provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the envelope was first created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the envelope was last saved
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Schema version of the writing tool
    #[serde(default)]
    pub version: String,
    /// Name of the writing tool
    #[serde(default)]
    pub source: String,
    /// Reserved for a future content digest
    #[serde(default)]
    pub checksum: Option<String>,
}

impl CacheMetadata {
    /// Mark the envelope as freshly saved.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Advisory staleness check against the last save time.
    #[must_use]
    pub fn is_expired(&self, max_age_hours: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.updated_at);
        age > chrono::Duration::hours(max_age_hours)
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            version: SCHEMA_VERSION.to_string(),
            source: SOURCE_NAME.to_string(),
            checksum: None,
        }
    }
}

/// The whole persisted envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataStore {
    /// Weapon catalogue section
    #[serde(default)]
    pub weapons: WeaponData,
    /// Decryption key section
    #[serde(default)]
    pub keys: KeyData,
    /// Cache metadata section
    #[serde(default)]
    pub cache: CacheMetadata,
    /// Configuration active at last save
    #[serde(default)]
    pub config_snapshot: serde_json::Value,
}

impl DataStore {
    /// Advisory staleness check, delegating to metadata.
    #[must_use]
    pub fn is_expired(&self, max_age_hours: i64) -> bool {
        self.cache.is_expired(max_age_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_weapon_data_recomputes_count() {
        let data = WeaponData::new(
            vec!["ak47".to_string(), "m4a1".to_string()],
            Some("spider_gen".to_string()),
            true,
        );
        assert_eq!(data.count, 2);
        assert!(data.blacklist_applied);
    }

    #[test]
    fn test_key_data_recomputes_count() {
        let keys = HashMap::from([("ak47".to_string(), "abc".to_string())]);
        let data = KeyData::new(keys, false);
        assert_eq!(data.count, 1);
        assert!(!data.validation_enabled);
    }

    #[test]
    fn test_expiry_uses_updated_at() {
        let mut meta = CacheMetadata::default();
        assert!(!meta.is_expired(24));

        meta.updated_at = Utc::now() - chrono::Duration::hours(25);
        assert!(meta.is_expired(24));
        assert!(!meta.is_expired(48));
    }

    #[test]
    fn test_empty_envelope_deserializes_with_defaults() {
        let store: DataStore = serde_json::from_str("{}").unwrap();
        assert!(store.weapons.weapons.is_empty());
        assert!(store.keys.keys.is_empty());
        assert!(store.weapons.filtered);
        assert!(store.keys.validation_enabled);
    }

    #[test]
    fn test_envelope_round_trips_through_json() {
        let store = DataStore {
            weapons: WeaponData::new(vec!["glock".to_string()], None, false),
            keys: KeyData::new(
                HashMap::from([("glock".to_string(), "key123".to_string())]),
                true,
            ),
            ..DataStore::default()
        };

        let json = serde_json::to_string_pretty(&store).unwrap();
        let restored: DataStore = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.weapons.weapons, store.weapons.weapons);
        assert_eq!(restored.keys.keys, store.keys.keys);
        assert_eq!(restored.cache.version, store.cache.version);
    }
}
