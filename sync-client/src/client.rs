//! Key exchange client with in-memory caching and bounded bulk fetch.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::response::{self, KeyOutcome};
use crate::retry::RetryPolicy;
use crate::wire::{self, RequestProfile};
use crate::{Result, SyncError};

/// Default key server endpoint.
pub const DEFAULT_API_URL: &str = "https://eu1.ultimate-disassembly.com/v/query2018.php";

/// Query string appended to every key request.
const STORE_QUERY: &str = "soc=steam";

/// Default number of key requests in flight at once.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the key-issuing endpoint.
///
/// Successful lookups are cached for the process lifetime, so repeated
/// calls for the same identifier hit the network once. The cache is
/// mutex-protected; the client is safe to share across tasks.
pub struct SyncClient {
    client: Client,
    api_url: String,
    profile: RequestProfile,
    retry: RetryPolicy,
    max_concurrent: usize,
    cache: Mutex<HashMap<String, String>>,
}

impl SyncClient {
    /// Create a client with default endpoint, profile, and timeouts.
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self::with_client(client))
    }

    /// Create a client with explicit connection and request timeouts.
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn with_timeouts(connect_secs: u64, request_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_secs))
            .timeout(Duration::from_secs(request_secs))
            .build()?;

        Ok(Self::with_client(client))
    }

    /// Create a client around a custom reqwest client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            profile: RequestProfile::default(),
            retry: RetryPolicy::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Set the key server URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Set the identity fields sent with every request.
    #[must_use]
    pub fn with_profile(mut self, profile: RequestProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the retry policy for transient failures.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the maximum number of key requests in flight at once.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Number of keys held in the in-memory cache.
    #[must_use]
    pub fn cached_key_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Fetch the sync key for one identifier.
    ///
    /// Returns `Ok(None)` when the server answers but declines to issue a
    /// key (nominal success without a key, or an unknown result code).
    /// Transient failures are retried per the policy.
    ///
    /// # Errors
    /// Fails on authentication rejection, on malformed responses, and
    /// when the retry budget is exhausted.
    #[instrument(skip(self))]
    pub async fn fetch_key(&self, identifier: &str) -> Result<Option<String>> {
        if let Some(key) = self.cache.lock().get(identifier).cloned() {
            debug!("Key cache hit for {identifier}");
            return Ok(Some(key));
        }

        let outcome = self
            .retry
            .run("key request", || self.request_key(identifier))
            .await?;

        match outcome {
            KeyOutcome::Key(key) => {
                self.cache
                    .lock()
                    .insert(identifier.to_string(), key.clone());
                Ok(Some(key))
            }
            KeyOutcome::NoKey => {
                warn!("No sync key issued for {identifier}");
                Ok(None)
            }
            KeyOutcome::Unknown { code } => {
                warn!("Key request for {identifier} failed with result code {code}");
                Ok(None)
            }
        }
    }

    /// Fetch keys for many identifiers with bounded concurrency.
    ///
    /// Results are aggregated as they complete, in arrival order. Returns
    /// the mapping of identifiers that yielded a key, and the identifiers
    /// that did not (declined or failed). Partial success is the normal
    /// outcome; nothing is raised.
    pub async fn fetch_keys(
        &self,
        identifiers: &[String],
    ) -> (HashMap<String, String>, Vec<String>) {
        info!("Fetching keys for {} identifiers", identifiers.len());

        let results: Vec<(String, Result<Option<String>>)> = stream::iter(identifiers)
            .map(|identifier| async move {
                let result = self.fetch_key(identifier).await;
                (identifier.clone(), result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut keys = HashMap::new();
        let mut failed = Vec::new();

        for (identifier, result) in results {
            match result {
                Ok(Some(key)) => {
                    keys.insert(identifier, key);
                }
                Ok(None) => failed.push(identifier),
                Err(e) => {
                    warn!("Failed to fetch key for {identifier}: {e}");
                    failed.push(identifier);
                }
            }
        }

        info!("Fetched {} keys ({} without)", keys.len(), failed.len());
        (keys, failed)
    }

    /// One framed request/response cycle for one identifier.
    async fn request_key(&self, identifier: &str) -> Result<KeyOutcome> {
        let body = self.profile.build_body(identifier, wire::unix_time());
        let payload = wire::encode_frame(&body)?;
        let url = format!("{}?{STORE_QUERY}", self.api_url);

        debug!("Requesting key for {identifier}");

        let response = self
            .client
            .put(&url)
            .header("Content-Type", "application/octet-stream")
            .header("User-Agent", self.profile.user_agent())
            .header("Accept-Encoding", "identity")
            .header("Accept", "*/*")
            .header("X-Unity-Version", &self.profile.unity_version)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SyncError::TransientStatus {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(SyncError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let text = wire::decode_frame(&bytes)?;
        response::parse_response(&text)
    }
}
