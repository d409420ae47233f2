//! Pipeline coordination across the cache, key, download, and decrypt
//! crates.
//!
//! A [`Coordinator`] owns one configured instance of each client plus
//! the cache store, and sequences the stages: refresh the catalogue,
//! ensure keys, download stale assets in polite batches, decrypt. Per
//! item failures are aggregated into the stage results and never abort
//! a run; hard errors (endpoint unreachable, cache unwritable) do.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use sync_client::{RetryPolicy, SyncClient};
use wog_cache::{Store, StoreStats};
use wog_cdn::CdnClient;
use wog_crypto::{ContainerReader, Decryptor, INDEX_ASSET_FILE, extract_catalogue};

use crate::config::WogConfig;

/// Aggregated result of the download stage.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DownloadOutcome {
    /// Identifiers downloaded and validated
    pub successful: Vec<String>,
    /// Identifiers that failed download or validation
    pub failed: Vec<String>,
    /// Whether cancellation stopped the stage early
    pub cancelled: bool,
}

/// Flags controlling a full pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Refresh the catalogue even when the cache is fresh
    pub force_catalogue: bool,
    /// Skip the download stage
    pub skip_download: bool,
    /// Skip the decrypt stage
    pub skip_decrypt: bool,
    /// Assets per polite download batch
    pub batch_size: usize,
    /// Keep downloading remaining batches after a failure
    pub continue_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force_catalogue: false,
            skip_download: false,
            skip_decrypt: false,
            batch_size: wog_cdn::DEFAULT_BATCH_SIZE,
            continue_on_error: false,
        }
    }
}

/// Summary of one full pipeline run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    /// Catalogue size after the refresh stage
    pub catalogue_size: usize,
    /// Keys available after the key stage
    pub keys_cached: usize,
    /// Weapons the endpoint issued no key for
    pub keys_failed: Vec<String>,
    /// Assets downloaded this run
    pub downloaded: Vec<String>,
    /// Assets that failed download or validation
    pub download_failed: Vec<String>,
    /// Decrypted files written this run
    pub decrypted_files: usize,
    /// Assets that failed extraction or decryption
    pub decrypt_failed: Vec<String>,
    /// Whether the run was cancelled before finishing
    pub cancelled: bool,
}

impl RunReport {
    /// Whether any stage reported per-item failures.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.keys_failed.is_empty()
            || !self.download_failed.is_empty()
            || !self.decrypt_failed.is_empty()
    }
}

/// Sequences the pipeline stages over one configuration.
pub struct Coordinator {
    config: WogConfig,
    store: Store,
    sync: SyncClient,
    cdn: CdnClient,
    decryptor: Decryptor,
    reader: Arc<dyn ContainerReader + Send + Sync>,
    cancel: Arc<AtomicBool>,
}

impl Coordinator {
    /// Build a coordinator and load the cache under the configured base
    /// directory.
    ///
    /// # Errors
    /// Fails when an HTTP client cannot be constructed.
    pub async fn new(
        config: WogConfig,
        reader: Arc<dyn ContainerReader + Send + Sync>,
    ) -> Result<Self> {
        let mut store = Store::load(config.runtime_dir()).await;
        store.set_config_snapshot(config.snapshot());

        let retry = RetryPolicy::default().with_max_retries(config.max_retries);
        let sync = SyncClient::with_timeouts(
            config.connect_timeout_secs,
            config.request_timeout_secs,
        )
        .context("building key exchange client")?
        .with_api_url(config.api_url.clone())
        .with_profile(config.profile.clone())
        .with_retry_policy(retry)
        .with_max_concurrent(config.concurrency);

        let cdn = CdnClient::builder()
            .data_url(config.data_url.clone())
            .assets_dir(config.assets_dir())
            .connect_timeout(config.connect_timeout_secs)
            .request_timeout(config.request_timeout_secs)
            .max_retries(config.max_retries)
            .max_concurrent(config.concurrency)
            .batch_delay_ms(config.batch_delay_ms)
            .build()
            .context("building download client")?;

        let decryptor = Decryptor::new(
            config.assets_dir(),
            config.encrypted_dir(),
            config.decrypted_dir(),
        )
        .with_chunk_size(config.chunk_size);

        Ok(Self {
            config,
            store,
            sync,
            cdn,
            decryptor,
            reader,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The configuration this coordinator runs with.
    #[must_use]
    pub fn config(&self) -> &WogConfig {
        &self.config
    }

    /// Catalogue currently in the cache.
    #[must_use]
    pub fn cached_weapons(&self) -> Vec<String> {
        self.store.weapons().to_vec()
    }

    /// Keys currently in the cache.
    #[must_use]
    pub fn cached_keys(&self) -> HashMap<String, String> {
        self.store.keys().clone()
    }

    /// Cache counters and timestamps for reporting.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Handle used to request cancellation from another task.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Flip the cancel flag on the first Ctrl-C.
    ///
    /// In-flight work finishes; no new batches start after the signal.
    pub fn arm_ctrl_c(&self) {
        let flag = self.cancel_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested, finishing in-flight work");
                flag.store(true, Ordering::Relaxed);
            }
        });
    }

    /// Download the catalogue index and extract the weapon list, or
    /// reuse the cached catalogue when it is present and fresh.
    ///
    /// # Errors
    /// Fails when the index cannot be fetched or parsed, or the cache
    /// cannot be written.
    pub async fn refresh_catalogue(&mut self, force: bool) -> Result<Vec<String>> {
        if !force
            && !self.store.weapons().is_empty()
            && !self.store.is_expired(self.config.expiry_hours)
        {
            info!(
                "Using cached catalogue ({} weapons)",
                self.store.weapons().len()
            );
            return Ok(self.store.weapons().to_vec());
        }

        let index_path = self
            .cdn
            .download_index()
            .await
            .context("downloading catalogue index")?;
        let data = tokio::fs::read(&index_path)
            .await
            .with_context(|| format!("reading {}", index_path.display()))?;

        let reader: &dyn ContainerReader = self.reader.as_ref();
        let catalogue = extract_catalogue(&data, reader, &self.config.combined_blacklist())
            .context("extracting catalogue")?;

        if catalogue.is_empty() {
            warn!("Catalogue is empty after blacklist filtering, keeping cached state");
            return Ok(catalogue);
        }

        self.store
            .save_weapons(catalogue.clone(), Some(INDEX_ASSET_FILE.to_string()), true)
            .await
            .context("saving catalogue")?;
        Ok(catalogue)
    }

    /// Make sure keys exist for the given weapons, fetching the missing
    /// ones. Returns the full key map plus the weapons the endpoint
    /// declined.
    ///
    /// # Errors
    /// Per-weapon fetch failures land in the returned list; only a
    /// cache write failure propagates.
    pub async fn ensure_keys(
        &mut self,
        weapons: &[String],
        refresh: bool,
    ) -> Result<(HashMap<String, String>, Vec<String>)> {
        let mut keys = self.store.keys().clone();

        let wanted: Vec<String> = if refresh {
            weapons.to_vec()
        } else {
            weapons
                .iter()
                .filter(|w| !keys.contains_key(w.as_str()))
                .cloned()
                .collect()
        };

        if wanted.is_empty() {
            debug!("All {} keys are already cached", weapons.len());
            return Ok((keys, Vec::new()));
        }

        info!("Fetching {} keys", wanted.len());
        let (fetched, failed) = self.sync.fetch_keys(&wanted).await;

        if !fetched.is_empty() {
            keys.extend(fetched);
            self.store
                .save_keys(keys.clone(), true)
                .await
                .context("saving keys")?;
        }
        if !failed.is_empty() {
            warn!("No keys issued for {} weapons", failed.len());
        }

        Ok((keys, failed))
    }

    /// Probe which of the given assets are missing or stale.
    pub async fn check_for_updates(&self, weapons: &[String]) -> Vec<String> {
        self.cdn.check_for_updates(weapons).await
    }

    /// Download the given assets in polite batches.
    ///
    /// Already current assets are skipped. Cancellation is honored
    /// between batches; a failed batch aborts the rest unless
    /// `continue_on_error` is set.
    pub async fn download_stage(
        &self,
        weapons: &[String],
        batch_size: usize,
        continue_on_error: bool,
        progress: Option<&ProgressBar>,
    ) -> DownloadOutcome {
        let mut outcome = DownloadOutcome::default();
        let batch_size = batch_size.max(1);

        for (index, chunk) in weapons.chunks(batch_size).enumerate() {
            if self.is_cancelled() {
                warn!("Cancelled with {} weapons unattempted", weapons.len() - index * batch_size);
                outcome.cancelled = true;
                break;
            }
            if index > 0 {
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }

            let (ok, bad) = self.cdn.download_batched(chunk, chunk.len(), continue_on_error).await;
            if let Some(bar) = progress {
                bar.inc(chunk.len() as u64);
            }

            let had_failures = !bad.is_empty();
            outcome.successful.extend(ok);
            outcome.failed.extend(bad);

            if had_failures && !continue_on_error {
                warn!("Aborting remaining batches after failures");
                break;
            }
        }

        outcome
    }

    /// Decrypt every local asset that has a key.
    ///
    /// # Errors
    /// Fails when the assets directory cannot be listed or the worker
    /// panics; per-asset failures come back in the second list.
    pub async fn decrypt_stage(
        &self,
        keys: &HashMap<String, String>,
    ) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let decryptor = self.decryptor.clone();
        let keys = keys.clone();
        let reader = Arc::clone(&self.reader);

        let result =
            tokio::task::spawn_blocking(move || decryptor.decrypt_all(&keys, reader.as_ref()))
                .await
                .context("decrypt worker panicked")?;
        result.context("decrypting local assets")
    }

    /// Decrypt a chosen subset of local assets.
    ///
    /// Cancellation is honored between assets.
    ///
    /// # Errors
    /// Fails only when a decrypt worker panics.
    pub async fn decrypt_selected(
        &self,
        weapons: &[String],
        keys: &HashMap<String, String>,
    ) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let mut decrypted = Vec::new();
        let mut failed = Vec::new();

        for name in weapons {
            if self.is_cancelled() {
                warn!("Cancelled before decrypting {name}");
                break;
            }
            let Some(key) = keys.get(name) else {
                warn!("No key cached for {name}");
                failed.push(name.clone());
                continue;
            };

            let decryptor = self.decryptor.clone();
            let reader = Arc::clone(&self.reader);
            let asset_path = self.cdn.asset_path(name);
            let key = key.clone();

            let result = tokio::task::spawn_blocking(move || {
                decryptor.decrypt_asset(&asset_path, &key, reader.as_ref())
            })
            .await
            .context("decrypt worker panicked")?;

            match result {
                Ok(paths) => decrypted.extend(paths),
                Err(e) => {
                    warn!("Failed to decrypt {name}: {e}");
                    failed.push(name.clone());
                }
            }
        }

        Ok((decrypted, failed))
    }

    /// Run every stage in order and aggregate the results.
    ///
    /// # Errors
    /// Propagates hard stage errors; per-item failures land in the
    /// report instead.
    pub async fn run(&mut self, options: RunOptions) -> Result<RunReport> {
        let mut report = RunReport::default();

        let catalogue = self.refresh_catalogue(options.force_catalogue).await?;
        report.catalogue_size = catalogue.len();
        if catalogue.is_empty() {
            warn!("Catalogue is empty, nothing to do");
            return Ok(report);
        }
        if self.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        let (keys, keys_failed) = self.ensure_keys(&catalogue, false).await?;
        report.keys_cached = keys.len();
        report.keys_failed = keys_failed;
        if self.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        if options.skip_download {
            info!("Skipping download stage");
        } else {
            let outcome = self
                .download_stage(&catalogue, options.batch_size, options.continue_on_error, None)
                .await;
            report.downloaded = outcome.successful;
            report.download_failed = outcome.failed;
            report.cancelled = outcome.cancelled;
        }
        if report.cancelled || self.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        if options.skip_decrypt {
            info!("Skipping decrypt stage");
        } else if keys.is_empty() {
            warn!("No keys available, skipping decrypt stage");
        } else {
            let (files, failed) = self.decrypt_stage(&keys).await?;
            report.decrypted_files = files.len();
            report.decrypt_failed = failed;
        }

        info!(
            "Run complete: {} catalogued, {} keys, {} downloaded, {} decrypted",
            report.catalogue_size,
            report.keys_cached,
            report.downloaded.len(),
            report.decrypted_files
        );
        Ok(report)
    }

    /// Import legacy text files into the cache.
    ///
    /// # Errors
    /// Fails when the imported cache cannot be saved.
    pub async fn migrate_legacy(&mut self) -> Result<bool> {
        self.store
            .migrate_legacy()
            .await
            .context("importing legacy text files")
    }

    /// Remove orphaned temporary files and undersized assets.
    ///
    /// # Errors
    /// Fails when the assets directory cannot be scanned.
    pub async fn cleanup(&self) -> Result<usize> {
        self.cdn
            .cleanup()
            .await
            .context("cleaning assets directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_failure_detection() {
        let mut report = RunReport::default();
        assert!(!report.has_failures());

        report.keys_failed.push("ak47".to_string());
        assert!(report.has_failures());

        let mut report = RunReport::default();
        report.decrypt_failed.push("m4a1".to_string());
        assert!(report.has_failures());
    }

    #[test]
    fn test_run_options_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.batch_size, 50);
        assert!(!options.skip_download);
        assert!(!options.continue_on_error);
    }
}
