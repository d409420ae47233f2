use std::process::ExitCode;

use anyhow::{Result, ensure};
use tracing::warn;

use crate::OutputFormat;
use crate::commands::{resolve_weapons, strict_exit};
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Decrypt downloaded assets into plain bundles.
pub async fn handle(
    weapons: Option<Vec<String>>,
    update_keys: bool,
    config: WogConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let strict = config.strict;
    let mut coordinator = Coordinator::new(config, default_reader()).await?;
    coordinator.arm_ctrl_c();

    let selected = weapons.filter(|w| !w.is_empty());

    if update_keys {
        let wanted = match &selected {
            Some(list) => list.clone(),
            None => resolve_weapons(&coordinator, None)?,
        };
        let (_, failed) = coordinator.ensure_keys(&wanted, false).await?;
        if !failed.is_empty() {
            warn!("{} weapons have no key and will fail to decrypt", failed.len());
        }
    }

    let keys = coordinator.cached_keys();
    ensure!(!keys.is_empty(), "no keys cached; run `wog keys` first");

    let (decrypted, failed) = match &selected {
        Some(list) => coordinator.decrypt_selected(list, &keys).await?,
        None => coordinator.decrypt_stage(&keys).await?,
    };

    if format.is_json() {
        let value = serde_json::json!({
            "decrypted_files": decrypted.len(),
            "failed": failed,
        });
        println!("{}", format.render(&value)?);
    } else {
        let style = OutputStyle::new();
        let target = coordinator.config().decrypted_dir();
        println!(
            "{} {} into {}",
            output::format_success("Decrypted", &style),
            output::format_count_badge(decrypted.len(), "file", &style),
            output::format_path(&target.display().to_string(), &style)
        );
        if !failed.is_empty() {
            println!(
                "{}",
                output::format_error(&format!("Failed: {}", failed.join(", ")), &style)
            );
        }
    }

    Ok(strict_exit(strict, !failed.is_empty()))
}
