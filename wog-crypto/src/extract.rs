//! Asset extraction and batch decryption.
//!
//! For each downloaded bundle the container reader yields named records.
//! Blob records are persisted verbatim to the encrypted side, then
//! stream-decrypted to the decrypted side with the per-asset derived key.
//! Re-runs are idempotent: a payload that is already materialized with the
//! right size is not extracted again, and decryption is only repeated when
//! the decrypted output is missing.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::container::{ContainerReader, RecordKind};
use crate::derive::derive_key;
use crate::xor::XorReader;
use crate::{CryptoError, Result};

/// Filename of the catalogue index bundle, excluded from batch decryption.
pub const INDEX_ASSET_FILE: &str = "spider_gen.unity3d";

/// Name of the text record inside the index bundle that lists the catalogue.
pub const CATALOGUE_RECORD: &str = "new_banners";

/// Default read size for streaming decryption.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Extension of downloaded bundles.
const ASSET_EXTENSION: &str = "unity3d";

/// Drives extraction and decryption of downloaded assets.
#[derive(Debug, Clone)]
pub struct Decryptor {
    assets_dir: PathBuf,
    encrypted_dir: PathBuf,
    decrypted_dir: PathBuf,
    chunk_size: usize,
}

impl Decryptor {
    /// Create a decryptor over the three asset directories.
    pub fn new(
        assets_dir: impl Into<PathBuf>,
        encrypted_dir: impl Into<PathBuf>,
        decrypted_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            encrypted_dir: encrypted_dir.into(),
            decrypted_dir: decrypted_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the streaming read size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Extract and decrypt every blob record of one downloaded asset.
    ///
    /// Returns the decrypted file paths. Records with empty names are
    /// skipped; they have no stable output filename and do not count as
    /// failures.
    ///
    /// # Errors
    /// Fails when the asset cannot be read, the container cannot be
    /// parsed, or a payload cannot be written.
    pub fn decrypt_asset(
        &self,
        asset_path: &Path,
        sync_key: &str,
        reader: &dyn ContainerReader,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.encrypted_dir)?;
        fs::create_dir_all(&self.decrypted_dir)?;

        let data = fs::read(asset_path)?;
        let records = reader.read_records(&data)?;
        let derived = derive_key(sync_key);

        let mut decrypted_files = Vec::new();

        for record in records {
            let payload = match record.kind {
                RecordKind::Blob(payload) => payload,
                RecordKind::Text(_) | RecordKind::Other(_) => {
                    trace!("Skipping non-blob record: {:?}", record.name);
                    continue;
                }
            };

            if record.name.is_empty() {
                debug!("Skipping blob record without a name");
                continue;
            }

            let encrypted_path = self.encrypted_dir.join(format!("{}.bytes", record.name));
            let decrypted_path = self
                .decrypted_dir
                .join(format!("{}.{ASSET_EXTENSION}", record.name));

            let already_extracted = encrypted_path
                .metadata()
                .map(|m| m.len() == payload.len() as u64)
                .unwrap_or(false);

            if already_extracted && decrypted_path.exists() {
                debug!("Already decrypted: {}", record.name);
                decrypted_files.push(decrypted_path);
                continue;
            }

            if !already_extracted {
                fs::write(&encrypted_path, &payload)?;
                trace!(
                    "Extracted {} bytes to {}",
                    payload.len(),
                    encrypted_path.display()
                );
            }

            self.decrypt_file(&encrypted_path, &decrypted_path, &derived)?;
            debug!("Decrypted: {}", record.name);
            decrypted_files.push(decrypted_path);
        }

        Ok(decrypted_files)
    }

    /// Decrypt every local asset except the catalogue index.
    ///
    /// An asset without a key is reported failed without being opened; an
    /// asset that fails parsing or IO is reported failed and processing
    /// continues. Returns the decrypted paths and the failed identifiers.
    ///
    /// # Errors
    /// Fails only when the assets directory itself cannot be listed.
    pub fn decrypt_all(
        &self,
        keys: &HashMap<String, String>,
        reader: &dyn ContainerReader,
    ) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let assets = self.local_assets()?;

        let mut decrypted_files = Vec::new();
        let mut failed = Vec::new();

        for asset_path in &assets {
            let Some(name) = asset_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let Some(sync_key) = keys.get(name) else {
                warn!("No key found for {name}");
                failed.push(name.to_string());
                continue;
            };

            match self.decrypt_asset(asset_path, sync_key, reader) {
                Ok(files) => decrypted_files.extend(files),
                Err(e) => {
                    warn!("Failed to decrypt {name}: {e}");
                    failed.push(name.to_string());
                }
            }
        }

        info!(
            "Decrypted {} files from {} assets",
            decrypted_files.len(),
            assets.len()
        );
        if !failed.is_empty() {
            warn!("Failed to decrypt {} assets", failed.len());
        }

        Ok((decrypted_files, failed))
    }

    /// List downloaded bundles, excluding the catalogue index, sorted by name.
    fn local_assets(&self) -> Result<Vec<PathBuf>> {
        let mut assets = Vec::new();

        for entry in fs::read_dir(&self.assets_dir)? {
            let path = entry?.path();
            let is_asset = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == ASSET_EXTENSION);
            let is_index = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n == INDEX_ASSET_FILE);

            if is_asset && !is_index {
                assets.push(path);
            }
        }

        assets.sort();
        Ok(assets)
    }

    /// Stream-decrypt one file with a continuous keystream.
    fn decrypt_file(&self, src: &Path, dst: &Path, derived_key: &str) -> Result<()> {
        let mut reader = XorReader::new(BufReader::new(File::open(src)?), derived_key)?;
        let mut writer = BufWriter::new(File::create(dst)?);

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Pull the weapon catalogue out of the index bundle.
///
/// Finds the catalogue text record, drops blank lines and `#` comments,
/// takes the part of each entry before `.png`, then removes blacklisted
/// names.
///
/// # Errors
/// Fails when the container cannot be parsed, the catalogue record is
/// missing, or it lists nothing at all. A catalogue that becomes empty
/// only after blacklist filtering is returned as-is.
pub fn extract_catalogue(
    data: &[u8],
    reader: &dyn ContainerReader,
    blacklist: &[String],
) -> Result<Vec<String>> {
    let records = reader.read_records(data)?;

    let text = records
        .iter()
        .find_map(|r| match &r.kind {
            RecordKind::Text(content) if r.name == CATALOGUE_RECORD => Some(content.clone()),
            _ => None,
        })
        .ok_or_else(|| CryptoError::record_not_found(CATALOGUE_RECORD))?;

    let normalized = text.replace('\r', "");
    let mut items = Vec::new();

    for line in normalized.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once(".png") {
            items.push(name.to_string());
        }
    }

    if items.is_empty() {
        return Err(CryptoError::EmptyCatalogue);
    }

    let before = items.len();
    items.retain(|name| !blacklist.iter().any(|b| b == name));
    if items.len() < before {
        debug!("Filtered out {} blacklisted items", before - items.len());
    }

    info!("Extracted {} identifiers from index asset", items.len());
    Ok(items)
}
