//! HTTP client for the asset data host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::{Client, Method, Response};
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::validate::{self, MAGIC_PROBE_LEN, MIN_ASSET_SIZE};
use crate::{CdnError, Result};

/// Default base URL of the asset data host.
pub const DEFAULT_DATA_URL: &str = "https://data1eu.ultimate-disassembly.com/uni2018";

/// Remote path of the catalogue index bundle.
pub const INDEX_ASSET_PATH: &str = "spider/spider_gen.unity3d";

/// Local filename of the catalogue index bundle.
pub const INDEX_ASSET_FILE: &str = "spider_gen.unity3d";

/// Default number of identifiers per download batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default maximum retries
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff in milliseconds
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Default maximum backoff in milliseconds
const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Default backoff multiplier
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default jitter factor (0.0 to 1.0)
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default number of requests in flight at once
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default pause between download batches in milliseconds
const DEFAULT_BATCH_DELAY_MS: u64 = 500;

/// Extension of downloaded bundles
const ASSET_EXTENSION: &str = "unity3d";

/// Suffix of in-flight temporary files
const TEMP_SUFFIX: &str = "part";

/// Client for downloading assets from the data host.
#[derive(Debug, Clone)]
pub struct CdnClient {
    /// HTTP client with connection pooling
    client: Client,
    /// Base URL of the data host
    data_url: String,
    /// Directory downloaded bundles land in
    assets_dir: PathBuf,
    /// Maximum number of retries
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
    /// Backoff multiplier
    backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter_factor: f64,
    /// Number of probe or download requests in flight at once
    max_concurrent: usize,
    /// Pause between download batches
    batch_delay: Duration,
}

impl CdnClient {
    /// Create a client for the default data host.
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(assets_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::builder().assets_dir(assets_dir).build()
    }

    /// Create a builder for configuring the client.
    #[must_use]
    pub fn builder() -> CdnClientBuilder {
        CdnClientBuilder::new()
    }

    /// Set the base URL of the data host.
    #[must_use]
    pub fn with_data_url(mut self, data_url: impl Into<String>) -> Self {
        self.data_url = data_url.into();
        self
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial backoff duration in milliseconds.
    #[must_use]
    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    /// Set the number of requests in flight at once.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Set the pause between download batches in milliseconds.
    #[must_use]
    pub fn with_batch_delay_ms(mut self, batch_delay_ms: u64) -> Self {
        self.batch_delay = Duration::from_millis(batch_delay_ms);
        self
    }

    /// Directory downloaded bundles land in.
    #[must_use]
    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Remote URL for one identifier.
    #[must_use]
    pub fn asset_url(&self, name: &str) -> String {
        format!("{}/{name}.{ASSET_EXTENSION}", self.data_url)
    }

    /// Local path for one identifier.
    #[must_use]
    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.assets_dir.join(format!("{name}.{ASSET_EXTENSION}"))
    }

    /// Calculate backoff duration with exponential backoff and jitter
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_backoff = base_backoff.min(self.max_backoff_ms as f64);

        // Add jitter
        let jitter_range = capped_backoff * self.jitter_factor;
        let jitter = rand::random::<f64>() * 2.0 * jitter_range - jitter_range;
        let final_backoff = (capped_backoff + jitter).max(0.0) as u64;

        Duration::from_millis(final_backoff)
    }

    /// Execute a request with retry logic.
    async fn execute_with_retry(&self, method: Method, url: &str, name: &str) -> Result<Response> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.calculate_backoff(attempt - 1);
                debug!("Retry attempt {} after {:?} backoff", attempt, backoff);
                sleep(backoff).await;
            }

            debug!("{method} {url} (attempt {})", attempt + 1);

            match self.client.request(method.clone(), url).send().await {
                Ok(response) => {
                    trace!("Response status: {}", response.status());
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        && attempt < self.max_retries
                    {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(60);

                        warn!(
                            "Rate limited (attempt {}): retry after {} seconds",
                            attempt + 1,
                            retry_after
                        );
                        last_error = Some(CdnError::rate_limited(retry_after));
                        continue;
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            "Server error {} (attempt {}): will retry",
                            status,
                            attempt + 1
                        );
                        last_error =
                            Some(CdnError::invalid_response(format!("server error {status}")));
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(CdnError::asset_not_found(name));
                    }

                    return Err(CdnError::invalid_response(format!(
                        "unexpected status {status}"
                    )));
                }
                Err(e) => {
                    let is_retryable = e.is_connect() || e.is_timeout() || e.is_request();

                    if is_retryable && attempt < self.max_retries {
                        warn!(
                            "Request failed (attempt {}): {}, will retry",
                            attempt + 1,
                            e
                        );
                        last_error = Some(CdnError::Http(e));
                    } else {
                        debug!(
                            "Request failed (attempt {}): {}, not retrying",
                            attempt + 1,
                            e
                        );
                        return Err(CdnError::Http(e));
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CdnError::invalid_response("all retry attempts failed")))
    }

    /// Server-reported size of one asset via a metadata-only request.
    ///
    /// Returns `None` when the server answers without a Content-Length.
    ///
    /// # Errors
    /// Fails when the asset is missing or the host is unreachable after
    /// retries.
    pub async fn remote_size(&self, name: &str) -> Result<Option<u64>> {
        let url = self.asset_url(name);
        let response = self.execute_with_retry(Method::HEAD, &url, name).await?;

        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        trace!("Remote size for {name}: {size:?}");
        Ok(size)
    }

    /// Whether one asset should be (re-)downloaded.
    ///
    /// True when there is no local file, when the sizes differ, and when
    /// the remote size cannot be determined at all. An unverifiable asset
    /// is treated as stale so a retry can repair it, at the cost of an
    /// occasional redundant download.
    pub async fn needs_update(&self, name: &str) -> bool {
        let local = self.asset_path(name);

        let Ok(metadata) = tokio::fs::metadata(&local).await else {
            debug!("No local copy of {name}");
            return true;
        };

        match self.remote_size(name).await {
            Ok(Some(remote)) => {
                let stale = metadata.len() != remote;
                if stale {
                    debug!(
                        "{name} is stale (local {} bytes, remote {remote} bytes)",
                        metadata.len()
                    );
                }
                stale
            }
            Ok(None) => {
                warn!("No size reported for {name}, treating as stale");
                true
            }
            Err(e) => {
                warn!("Failed to probe {name}: {e}, treating as stale");
                true
            }
        }
    }

    /// Probe many assets in parallel, returning those needing download.
    ///
    /// Results arrive in completion order, not input order.
    pub async fn check_for_updates(&self, identifiers: &[String]) -> Vec<String> {
        let stale: Vec<String> = stream::iter(identifiers)
            .map(|name| async move {
                if self.needs_update(name).await {
                    Some(name.clone())
                } else {
                    None
                }
            })
            .buffer_unordered(self.max_concurrent)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        info!(
            "Found {} of {} assets to download",
            stale.len(),
            identifiers.len()
        );
        stale
    }

    /// Download one asset to its final local path.
    ///
    /// The body is streamed to a `.part` file, the header and size are
    /// validated, and only then is the file renamed into place. A failed
    /// validation discards the temporary file and is not retried here;
    /// retrying is the batch caller's decision.
    ///
    /// # Errors
    /// Fails on network errors after retries, on IO errors, and when the
    /// downloaded data fails validation.
    pub async fn download_asset(&self, name: &str) -> Result<PathBuf> {
        let url = self.asset_url(name);
        self.download_url(&url, name).await
    }

    /// Download the catalogue index bundle if it is stale.
    ///
    /// # Errors
    /// Fails on network, IO, or validation errors.
    pub async fn download_index(&self) -> Result<PathBuf> {
        let url = format!("{}/{INDEX_ASSET_PATH}", self.data_url);
        let local = self.assets_dir.join(INDEX_ASSET_FILE);

        if let Ok(metadata) = tokio::fs::metadata(&local).await {
            let current = match self.execute_with_retry(Method::HEAD, &url, INDEX_ASSET_FILE).await
            {
                Ok(response) => response
                    .headers()
                    .get(reqwest::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .is_some_and(|remote| remote == metadata.len()),
                Err(e) => {
                    warn!("Failed to probe catalogue index: {e}, treating as stale");
                    false
                }
            };

            if current {
                info!("Catalogue index is up to date");
                return Ok(local);
            }
        }

        info!("Downloading catalogue index");
        self.download_url(&url, INDEX_ASSET_FILE).await
    }

    /// Stream one URL to a validated local file.
    async fn download_url(&self, url: &str, name: &str) -> Result<PathBuf> {
        let file_name = if name.ends_with(&format!(".{ASSET_EXTENSION}")) {
            name.to_string()
        } else {
            format!("{name}.{ASSET_EXTENSION}")
        };
        let final_path = self.assets_dir.join(&file_name);
        let temp_path = self.assets_dir.join(format!("{file_name}.{TEMP_SUFFIX}"));

        tokio::fs::create_dir_all(&self.assets_dir).await?;

        let response = self.execute_with_retry(Method::GET, url, name).await?;

        let streamed = stream_to_file(response, &temp_path).await;
        let (header, total) = match streamed {
            Ok(result) => result,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = validate::check_asset(name, &header, total) {
            warn!("Discarding {name}: {e}");
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &final_path).await?;
        debug!("Downloaded {name} ({total} bytes)");
        Ok(final_path)
    }

    /// Download a set of identifiers with bounded concurrency.
    async fn download_many(&self, identifiers: &[String]) -> (Vec<String>, Vec<String>) {
        let results: Vec<(String, Result<PathBuf>)> = stream::iter(identifiers)
            .map(|name| async move {
                let result = self.download_asset(name).await;
                (name.clone(), result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for (name, result) in results {
            match result {
                Ok(_) => successful.push(name),
                Err(e) => {
                    warn!("Failed to download {name}: {e}");
                    failed.push(name);
                }
            }
        }

        (successful, failed)
    }

    /// Download all stale assets from a catalogue, in polite batches.
    ///
    /// Identifiers already current are skipped. Each batch downloads with
    /// bounded concurrency, with a pause between batches. When
    /// `continue_on_error` is false, a batch containing a failure aborts
    /// the remaining batches; identifiers never attempted appear in
    /// neither list. Otherwise every stale identifier ends up in exactly
    /// one of the two returned lists.
    pub async fn download_batched(
        &self,
        identifiers: &[String],
        batch_size: usize,
        continue_on_error: bool,
    ) -> (Vec<String>, Vec<String>) {
        let to_download = self.check_for_updates(identifiers).await;

        if to_download.is_empty() {
            info!("All assets are up to date");
            return (Vec::new(), Vec::new());
        }

        let batch_size = batch_size.max(1);
        let batch_count = to_download.len().div_ceil(batch_size);

        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for (index, batch) in to_download.chunks(batch_size).enumerate() {
            if index > 0 {
                trace!("Pausing {:?} between batches", self.batch_delay);
                sleep(self.batch_delay).await;
            }

            info!(
                "Downloading batch {}/{batch_count} ({} assets)",
                index + 1,
                batch.len()
            );

            let (ok, bad) = self.download_many(batch).await;
            successful.extend(ok);
            let had_failures = !bad.is_empty();
            failed.extend(bad);

            if had_failures && !continue_on_error {
                warn!("Aborting remaining batches after failures");
                break;
            }
        }

        info!(
            "Downloaded {} assets ({} failures)",
            successful.len(),
            failed.len()
        );
        (successful, failed)
    }

    /// Remove orphaned temporary files and implausibly small assets.
    ///
    /// Returns how many files were removed. A missing assets directory
    /// counts as nothing to clean.
    ///
    /// # Errors
    /// Fails when the directory cannot be scanned or a removal fails.
    pub async fn cleanup(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.assets_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let orphaned_temp = file_name.ends_with(&format!(".{TEMP_SUFFIX}"));
            let truncated_asset = file_name.ends_with(&format!(".{ASSET_EXTENSION}"))
                && entry.metadata().await?.len() < MIN_ASSET_SIZE;

            if orphaned_temp || truncated_asset {
                debug!("Removing {}", path.display());
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Cleaned up {removed} files");
        }
        Ok(removed)
    }
}

/// Stream a response body to disk, capturing the header probe.
async fn stream_to_file(response: Response, path: &Path) -> Result<(Vec<u8>, u64)> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();

    let mut header = Vec::with_capacity(MAGIC_PROBE_LEN);
    let mut total: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if header.len() < MAGIC_PROBE_LEN {
            let take = (MAGIC_PROBE_LEN - header.len()).min(chunk.len());
            header.extend_from_slice(&chunk[..take]);
        }
        total += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok((header, total))
}

/// Builder for [`CdnClient`].
#[derive(Debug, Clone)]
pub struct CdnClientBuilder {
    data_url: String,
    assets_dir: PathBuf,
    connect_timeout_secs: u64,
    request_timeout_secs: u64,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
    max_concurrent: usize,
    batch_delay_ms: u64,
}

impl CdnClientBuilder {
    /// Create a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            assets_dir: PathBuf::from("assets"),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
        }
    }

    /// Set the base URL of the data host.
    #[must_use]
    pub fn data_url(mut self, data_url: impl Into<String>) -> Self {
        self.data_url = data_url.into();
        self
    }

    /// Set the directory downloaded bundles land in.
    #[must_use]
    pub fn assets_dir(mut self, assets_dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = assets_dir.into();
        self
    }

    /// Set the connection timeout in seconds.
    #[must_use]
    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial backoff duration in milliseconds.
    #[must_use]
    pub fn initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    /// Set the maximum backoff duration in milliseconds.
    #[must_use]
    pub fn max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Set the jitter factor (clamped to 0.0..=1.0).
    #[must_use]
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Set the number of requests in flight at once.
    #[must_use]
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Set the pause between download batches in milliseconds.
    #[must_use]
    pub fn batch_delay_ms(mut self, batch_delay_ms: u64) -> Self {
        self.batch_delay_ms = batch_delay_ms;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn build(self) -> Result<CdnClient> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .pool_max_idle_per_host(self.max_concurrent.max(4))
            .build()?;

        Ok(CdnClient {
            client,
            data_url: self.data_url,
            assets_dir: self.assets_dir,
            max_retries: self.max_retries,
            initial_backoff_ms: self.initial_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
            max_concurrent: self.max_concurrent,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        })
    }
}

impl Default for CdnClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Install ring crypto provider for reqwest/rustls (idempotent)
    fn install_crypto_provider() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[test]
    fn test_asset_url_template() {
        install_crypto_provider();
        let client = CdnClient::new("assets").unwrap();
        assert_eq!(
            client.asset_url("ak47"),
            "https://data1eu.ultimate-disassembly.com/uni2018/ak47.unity3d"
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        install_crypto_provider();
        let client = CdnClient::builder()
            .assets_dir("assets")
            .jitter_factor(0.0)
            .build()
            .unwrap();

        assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(client.calculate_backoff(20), Duration::from_millis(10_000));
    }

    #[test]
    fn test_concurrency_floor_is_one() {
        install_crypto_provider();
        let client = CdnClient::new("assets").unwrap().with_max_concurrent(0);
        assert_eq!(client.max_concurrent, 1);
    }
}
