//! Repeating-keystream XOR cipher.
//!
//! The cipher XORs every payload byte with the key bytes repeated end to
//! end. It tracks how many bytes it has processed so that chunked callers
//! keep a single continuous keystream: chunk N+1 resumes at key offset
//! `bytes_processed % key_len`, never back at zero. Applying the cipher
//! twice with the same key restores the input (XOR is symmetric).

use std::io::{Read, Result as IoResult};

use crate::{CryptoError, Result};

/// Stateful XOR cipher over a repeating key.
#[derive(Debug, Clone)]
pub struct XorCipher {
    key: Vec<u8>,
    processed: u64,
}

impl XorCipher {
    /// Create a cipher from key material.
    ///
    /// # Errors
    /// Returns [`CryptoError::EmptyKey`] if the key is empty.
    pub fn new(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        Ok(Self {
            key: key.as_bytes().to_vec(),
            processed: 0,
        })
    }

    /// Apply the keystream to a chunk in place, continuing from the
    /// position reached by previous calls.
    pub fn apply(&mut self, data: &mut [u8]) {
        let key_len = self.key.len();
        let mut offset = (self.processed % key_len as u64) as usize;

        for byte in data.iter_mut() {
            *byte ^= self.key[offset];
            offset += 1;
            if offset == key_len {
                offset = 0;
            }
        }

        self.processed += data.len() as u64;
    }

    /// Total bytes processed since creation or the last reset.
    pub fn bytes_processed(&self) -> u64 {
        self.processed
    }

    /// Rewind the keystream to the start of the key.
    pub fn reset(&mut self) {
        self.processed = 0;
    }
}

/// Streaming reader that decrypts (or encrypts) bytes as they pass through.
///
/// Wraps any [`Read`] source and applies a continuous XOR keystream, so
/// arbitrarily large files can be processed with bounded-size reads.
pub struct XorReader<R: Read> {
    inner: R,
    cipher: XorCipher,
}

impl<R: Read> XorReader<R> {
    /// Wrap a reader with a fresh keystream for the given key.
    pub fn new(inner: R, key: &str) -> Result<Self> {
        Ok(Self {
            inner,
            cipher: XorCipher::new(key)?,
        })
    }

    /// Consume the wrapper and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for XorReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply(&mut buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_round_trip() {
        let plaintext = b"Hello, World! This is a test message.".to_vec();
        let mut buf = plaintext.clone();

        let mut cipher = XorCipher::new("0123456789abcdef").unwrap();
        cipher.apply(&mut buf);
        assert_ne!(buf, plaintext);

        let mut cipher = XorCipher::new("0123456789abcdef").unwrap();
        cipher.apply(&mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn test_chunked_matches_single_pass() {
        let data: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        let key = "deadbeef01";

        let mut whole = data.clone();
        let mut cipher = XorCipher::new(key).unwrap();
        cipher.apply(&mut whole);

        // Awkward split sizes, none a multiple of the key length.
        let mut chunked = data.clone();
        let mut cipher = XorCipher::new(key).unwrap();
        let mut pos = 0;
        for size in [1, 7, 13, 64, 3, 512, 400] {
            let end = (pos + size).min(chunked.len());
            cipher.apply(&mut chunked[pos..end]);
            pos = end;
            if pos == chunked.len() {
                break;
            }
        }
        assert_eq!(pos, chunked.len());
        assert_eq!(chunked, whole);
    }

    #[test]
    fn test_keystream_position_tracking() {
        let mut cipher = XorCipher::new("abc").unwrap();
        assert_eq!(cipher.bytes_processed(), 0);

        cipher.apply(&mut [0u8; 7]);
        assert_eq!(cipher.bytes_processed(), 7);

        cipher.reset();
        assert_eq!(cipher.bytes_processed(), 0);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(XorCipher::new(""), Err(CryptoError::EmptyKey)));
    }

    #[test]
    fn test_reader_round_trip_with_small_buffer() {
        let plaintext = b"streaming decryption across many tiny reads".to_vec();

        let mut encrypted = plaintext.clone();
        let mut cipher = XorCipher::new("k3y").unwrap();
        cipher.apply(&mut encrypted);

        let mut reader = XorReader::new(Cursor::new(encrypted), "k3y").unwrap();
        let mut result = Vec::new();
        let mut buf = [0u8; 5];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            result.extend_from_slice(&buf[..n]);
        }

        assert_eq!(result, plaintext);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn keystream_key() -> impl Strategy<Value = String> {
            "[0-9a-f]{1,32}"
        }

        proptest! {
            /// Applying the cipher twice with the same key restores the input
            #[test]
            fn double_apply_is_identity(
                data in prop::collection::vec(any::<u8>(), 0..4096),
                key in keystream_key()
            ) {
                let mut buf = data.clone();

                let mut cipher = XorCipher::new(&key).unwrap();
                cipher.apply(&mut buf);
                let mut cipher = XorCipher::new(&key).unwrap();
                cipher.apply(&mut buf);

                prop_assert_eq!(buf, data);
            }

            /// Chunked application matches a single pass regardless of split points
            #[test]
            fn chunking_never_changes_output(
                data in prop::collection::vec(any::<u8>(), 1..2048),
                key in keystream_key(),
                chunk_size in 1usize..257
            ) {
                let mut single = data.clone();
                let mut cipher = XorCipher::new(&key).unwrap();
                cipher.apply(&mut single);

                let mut chunked = data.clone();
                let mut cipher = XorCipher::new(&key).unwrap();
                for chunk in chunked.chunks_mut(chunk_size) {
                    cipher.apply(chunk);
                }

                prop_assert_eq!(chunked, single);
            }

            /// The reader produces the same plaintext as an in-place decrypt
            #[test]
            fn reader_matches_in_place_apply(
                data in prop::collection::vec(any::<u8>(), 0..2048),
                key in keystream_key()
            ) {
                let mut expected = data.clone();
                let mut cipher = XorCipher::new(&key).unwrap();
                cipher.apply(&mut expected);

                let mut reader = XorReader::new(Cursor::new(data), &key).unwrap();
                let mut actual = Vec::new();
                reader.read_to_end(&mut actual).unwrap();

                prop_assert_eq!(actual, expected);
            }
        }
    }
}
