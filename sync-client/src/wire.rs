//! Request body construction and the length-framed bzip2 wire codec.
//!
//! Both directions use the same framing: a 4-byte little-endian length
//! of the compressed payload, followed by the bzip2 stream.

use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use tracing::trace;

use crate::{Result, SyncError};

/// Size of the length prefix shared by requests and responses.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Fixed identity fields sent with every key request.
///
/// The defaults reproduce what the Steam build of the game sends; a
/// banned session or device identifier can be swapped out per client.
#[derive(Debug, Clone)]
pub struct RequestProfile {
    /// Session identifier
    pub session: String,
    /// Account identifier
    pub account_id: String,
    /// Device identifier
    pub device_id: String,
    /// Game mode flag
    pub game_mode: String,
    /// Game version string
    pub game_version: String,
    /// Unity engine version string
    pub unity_version: String,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            session: "37".to_string(),
            account_id: "5390315".to_string(),
            device_id: "e35c060a502dd9fdee3bfa107ab0cc24477f6a1a".to_string(),
            game_mode: "FIELD_STRIP".to_string(),
            game_version: "2.2.1z5".to_string(),
            unity_version: "2019.2.18f1".to_string(),
        }
    }
}

impl RequestProfile {
    /// Assemble the plaintext query-string body for one identifier.
    ///
    /// Field order is part of the protocol and must not change.
    #[must_use]
    pub fn build_body(&self, model: &str, time: u64) -> String {
        format!(
            "query=3&model={model}&need_details=1&session={}&id={}&dev={}&mode={}&ver={}&uver={}&time={time}",
            self.session,
            self.account_id,
            self.device_id,
            self.game_mode,
            self.game_version,
            self.unity_version,
        )
    }

    /// User agent string the game client presents.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "UnityPlayer/{} (UnityWebRequest/1.0, libcurl/7.52.0-DEV)",
            self.unity_version
        )
    }
}

/// Current Unix timestamp for request bodies.
#[must_use]
pub fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Compress a plaintext body and prefix it with the compressed length.
///
/// # Errors
/// Fails when bzip2 compression fails.
pub fn encode_frame(body: &str) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(body.as_bytes())
        .map_err(|e| SyncError::compression(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SyncError::compression(e.to_string()))?;

    let mut framed = Vec::with_capacity(FRAME_PREFIX_LEN + compressed.len());
    framed.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    framed.extend_from_slice(&compressed);

    trace!("Framed {} byte body into {} bytes", body.len(), framed.len());
    Ok(framed)
}

/// Strip the echoed length prefix and decompress the remainder.
///
/// # Errors
/// Fails when the payload is shorter than the prefix, is not a valid
/// bzip2 stream, or does not decompress to UTF-8.
pub fn decode_frame(data: &[u8]) -> Result<String> {
    if data.len() < FRAME_PREFIX_LEN {
        return Err(SyncError::ResponseTooShort {
            length: data.len(),
            expected: FRAME_PREFIX_LEN,
        });
    }

    let mut decoder = BzDecoder::new(&data[FRAME_PREFIX_LEN..]);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SyncError::decompression(e.to_string()))?;

    trace!(
        "Decoded {} byte frame into {} bytes",
        data.len(),
        decompressed.len()
    );

    String::from_utf8(decompressed)
        .map_err(|e| SyncError::invalid_response(format!("response is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_body_field_order_is_fixed() {
        let profile = RequestProfile::default();
        let body = profile.build_body("ak47", 1700000000);

        assert_eq!(
            body,
            "query=3&model=ak47&need_details=1&session=37&id=5390315&\
             dev=e35c060a502dd9fdee3bfa107ab0cc24477f6a1a&mode=FIELD_STRIP&\
             ver=2.2.1z5&uver=2019.2.18f1&time=1700000000"
        );
    }

    #[test]
    fn test_user_agent_embeds_unity_version() {
        let profile = RequestProfile::default();
        assert_eq!(
            profile.user_agent(),
            "UnityPlayer/2019.2.18f1 (UnityWebRequest/1.0, libcurl/7.52.0-DEV)"
        );
    }

    #[test]
    fn test_frame_round_trip() {
        let body = "result=0&sync=abc123&done=1";
        let framed = encode_frame(body).unwrap();

        // Prefix carries the compressed length, not the frame length.
        let prefix = u32::from_le_bytes(framed[..4].try_into().unwrap());
        assert_eq!(prefix as usize, framed.len() - FRAME_PREFIX_LEN);

        assert_eq!(decode_frame(&framed).unwrap(), body);
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        let err = decode_frame(&[1, 2]).unwrap_err();
        assert!(matches!(err, SyncError::ResponseTooShort { length: 2, .. }));
    }

    #[test]
    fn test_decode_rejects_garbage_after_prefix() {
        let mut data = 5u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"nope!");
        assert!(matches!(
            decode_frame(&data).unwrap_err(),
            SyncError::Decompression(_)
        ));
    }
}
