//! Per-asset key derivation.
//!
//! The key endpoint hands out an opaque sync key per asset. The effective
//! XOR key is the MD5 digest of that sync key concatenated with a fixed,
//! publicly known salt, rendered as lowercase hex. The 32 hex characters
//! themselves are the keystream material, not the raw digest bytes.

/// Fixed salt appended to every sync key before hashing.
pub const KEY_SALT: &str = "World of Guns: Gun Disassembly";

/// Derive the effective cipher key for an asset from its sync key.
///
/// Deterministic: the same sync key always yields the same derived key.
///
/// # Example
///
/// ```
/// let key = wog_crypto::derive_key("abc123");
/// assert_eq!(key.len(), 32);
/// assert_eq!(key, wog_crypto::derive_key("abc123"));
/// ```
#[must_use]
pub fn derive_key(sync_key: &str) -> String {
    let digest = md5::compute(format!("{sync_key}{KEY_SALT}"));
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_key("somekey");
        let b = derive_key("somekey");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_keys_derive_distinct_material() {
        assert_ne!(derive_key("key-a"), derive_key("key-b"));
        assert_ne!(derive_key(""), derive_key("x"));
    }

    #[test]
    fn test_derived_key_is_lowercase_hex() {
        let key = derive_key("ak47");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, key.to_lowercase());
    }

    #[test]
    fn test_salt_changes_output() {
        // The derived key must not be the digest of the bare sync key.
        let bare = format!("{:x}", md5::compute("ak47"));
        assert_ne!(derive_key("ak47"), bare);
    }
}
