//! Interpretation of decoded key server responses.

use tracing::{debug, warn};

use crate::{Result, SyncError};

/// Result field value for success.
const RESULT_OK: u32 = 0;

/// Result field value for an authentication rejection.
const RESULT_AUTH_FAILURE: u32 = 100;

/// Result field values the server uses for transient conditions.
const TRANSIENT_RESULTS: [u32; 5] = [429, 500, 502, 503, 504];

/// What a successfully parsed response means for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Success with a sync key
    Key(String),
    /// Nominal success without a sync key; valid, not an error
    NoKey,
    /// Unrecognized result code, treated as a soft failure
    Unknown { code: u32 },
}

/// Parse the decompressed query-string response for one identifier.
///
/// # Errors
/// Fails when the result field is missing or non-numeric, when the
/// server rejects authentication, or signals a transient condition
/// (which the retry policy may attempt again).
pub fn parse_response(text: &str) -> Result<KeyOutcome> {
    let code: u32 = field(text, "result")
        .ok_or_else(|| SyncError::invalid_response("missing result field"))?
        .parse()
        .map_err(|_| SyncError::invalid_response("non-numeric result field"))?;

    match code {
        RESULT_OK => match field(text, "sync") {
            Some(key) if !key.is_empty() => {
                debug!("Server issued a sync key");
                Ok(KeyOutcome::Key(key.to_string()))
            }
            _ => {
                warn!("Server reported success but returned no sync key");
                Ok(KeyOutcome::NoKey)
            }
        },
        RESULT_AUTH_FAILURE => Err(SyncError::Authentication),
        code if TRANSIENT_RESULTS.contains(&code) => Err(SyncError::TransientResult { code }),
        code => {
            warn!("Server returned unknown result code {code}");
            Ok(KeyOutcome::Unknown { code })
        }
    }
}

/// Look up one field in a query-string body.
fn field<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_with_key() {
        let outcome = parse_response("result=0&sync=8f14e45fceea&done=1").unwrap();
        assert_eq!(outcome, KeyOutcome::Key("8f14e45fceea".to_string()));
    }

    #[test]
    fn test_success_without_key_is_not_an_error() {
        let outcome = parse_response("result=0&details=none").unwrap();
        assert_eq!(outcome, KeyOutcome::NoKey);
    }

    #[test]
    fn test_empty_sync_value_counts_as_no_key() {
        let outcome = parse_response("result=0&sync=").unwrap();
        assert_eq!(outcome, KeyOutcome::NoKey);
    }

    #[test]
    fn test_auth_failure_is_terminal() {
        let err = parse_response("result=100").unwrap_err();
        assert!(matches!(err, SyncError::Authentication));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_result_codes_are_retryable() {
        for code in [429u32, 500, 502, 503, 504] {
            let err = parse_response(&format!("result={code}")).unwrap_err();
            assert!(err.is_transient(), "result={code} should be transient");
        }
    }

    #[test]
    fn test_unknown_code_is_a_soft_failure() {
        let outcome = parse_response("result=1000").unwrap();
        assert_eq!(outcome, KeyOutcome::Unknown { code: 1000 });
    }

    #[test]
    fn test_missing_result_field_is_malformed() {
        assert!(matches!(
            parse_response("sync=abc").unwrap_err(),
            SyncError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_non_numeric_result_is_malformed() {
        assert!(matches!(
            parse_response("result=err").unwrap_err(),
            SyncError::InvalidResponse(_)
        ));
    }
}
