//! Library backing the `wog` command-line tool.
//!
//! The binary wires four concerns together: the catalogue and key cache
//! (`wog-cache`), the key exchange endpoint (`sync-client`), the asset
//! data host (`wog-cdn`), and payload decryption (`wog-crypto`). The
//! [`pipeline::Coordinator`] sequences them; the modules under
//! [`commands`] map one subcommand each onto the coordinator.

pub mod commands;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod reader;

pub use config::{DEFAULT_CONCURRENCY, WogConfig};
pub use pipeline::{Coordinator, RunOptions, RunReport};

use clap::Subcommand;
use wog_cdn::DEFAULT_BATCH_SIZE;

/// Subcommands of the `wog` binary.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Refresh the weapon catalogue from the remote index
    Catalogue {
        /// Re-download the index even when the cache is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch decryption keys for cached or given weapons
    Keys {
        /// Comma-separated weapon names (defaults to the cached catalogue)
        #[arg(short, long, value_delimiter = ',')]
        weapons: Option<Vec<String>>,

        /// Re-fetch keys that are already cached
        #[arg(short, long)]
        refresh: bool,
    },

    /// Download weapon assets that are missing or stale
    Download {
        /// Comma-separated weapon names (defaults to the cached catalogue)
        #[arg(short, long, value_delimiter = ',')]
        weapons: Option<Vec<String>>,

        /// Fetch missing keys before downloading
        #[arg(short, long)]
        update_keys: bool,

        /// List stale assets without downloading anything
        #[arg(long)]
        check_only: bool,

        /// Assets per polite batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Keep downloading remaining batches after a failure
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Decrypt downloaded assets into plain bundles
    Decrypt {
        /// Comma-separated weapon names (defaults to every local asset)
        #[arg(short, long, value_delimiter = ',')]
        weapons: Option<Vec<String>>,

        /// Fetch missing keys before decrypting
        #[arg(short, long)]
        update_keys: bool,
    },

    /// Run the full catalogue, keys, download, decrypt pipeline
    Run {
        /// Skip the download stage
        #[arg(long)]
        skip_download: bool,

        /// Skip the decrypt stage
        #[arg(long)]
        skip_decrypt: bool,

        /// Assets per polite batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Keep downloading remaining batches after a failure
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Show configuration, cache state, and local file counts
    Info,

    /// Import legacy weapons.txt and keys.txt into the cache
    Migrate,

    /// Remove orphaned temporary files and undersized assets
    Cleanup,
}

/// Output format options for the CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl OutputFormat {
    /// Whether this format emits JSON.
    #[must_use]
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }

    /// Serialize a value according to the format.
    ///
    /// # Errors
    /// Fails when the value cannot be serialized.
    pub fn render(self, value: &serde_json::Value) -> serde_json::Result<String> {
        match self {
            Self::JsonPretty => serde_json::to_string_pretty(value),
            _ => serde_json::to_string(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_render() {
        let value = serde_json::json!({"count": 3});
        assert_eq!(
            OutputFormat::Json.render(&value).unwrap(),
            r#"{"count":3}"#
        );
        assert!(
            OutputFormat::JsonPretty
                .render(&value)
                .unwrap()
                .contains('\n')
        );
        assert!(!OutputFormat::Text.is_json());
    }
}
