//! Downloaded asset validation.
//!
//! Unity bundles open with a recognizable signature. The check here is
//! strict: a minimum plausible size plus one of the known signatures,
//! with no permissive fallbacks.

use crate::{CdnError, Result};

/// Smallest size a real asset can plausibly have.
pub const MIN_ASSET_SIZE: u64 = 128;

/// Number of leading bytes inspected for a signature.
pub const MAGIC_PROBE_LEN: usize = 16;

/// Signatures a Unity bundle may open with.
const UNITY_SIGNATURES: [&[u8]; 4] = [b"UnityFS", b"UnityWeb", b"UnityRaw", b"UnityArchive"];

/// Whether the probe bytes open with a known Unity signature.
#[must_use]
pub fn has_unity_signature(header: &[u8]) -> bool {
    UNITY_SIGNATURES
        .iter()
        .any(|magic| header.starts_with(magic))
}

/// Check a downloaded asset's header probe and total size.
///
/// # Errors
/// Fails when the asset is shorter than [`MIN_ASSET_SIZE`] or its header
/// carries no known signature; the message names the leading bytes.
pub fn check_asset(name: &str, header: &[u8], total_size: u64) -> Result<()> {
    if total_size < MIN_ASSET_SIZE {
        return Err(CdnError::validation(
            name,
            format!("only {total_size} bytes, expected at least {MIN_ASSET_SIZE}"),
        ));
    }

    if !has_unity_signature(header) {
        let leading = hex::encode(&header[..header.len().min(8)]);
        return Err(CdnError::validation(
            name,
            format!("unrecognized container header 0x{leading}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_of(magic: &[u8]) -> Vec<u8> {
        let mut header = magic.to_vec();
        header.resize(MAGIC_PROBE_LEN, 0);
        header
    }

    #[test]
    fn test_known_signatures_pass() {
        for magic in [
            b"UnityFS".as_slice(),
            b"UnityWeb",
            b"UnityRaw",
            b"UnityArchive",
        ] {
            let header = header_of(magic);
            assert!(check_asset("ak47", &header, 4096).is_ok());
        }
    }

    #[test]
    fn test_short_asset_is_rejected() {
        let header = header_of(b"UnityFS");
        let err = check_asset("ak47", &header, 64).unwrap_err();
        assert!(matches!(err, CdnError::Validation { .. }));
    }

    #[test]
    fn test_unknown_header_is_rejected_with_leading_bytes() {
        let err = check_asset("ak47", b"<html>error page", 4096).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("0x"));
        assert!(matches!(err, CdnError::Validation { .. }));
    }

    #[test]
    fn test_truncated_probe_is_rejected() {
        assert!(check_asset("ak47", b"Uni", 4096).is_err());
    }
}
