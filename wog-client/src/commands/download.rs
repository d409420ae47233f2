use std::process::ExitCode;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::OutputFormat;
use crate::commands::{EXIT_CANCELLED, resolve_weapons, strict_exit};
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Download missing or stale weapon assets.
pub async fn handle(
    weapons: Option<Vec<String>>,
    update_keys: bool,
    check_only: bool,
    batch_size: usize,
    continue_on_error: bool,
    config: WogConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let strict = config.strict;
    let mut coordinator = Coordinator::new(config, default_reader()).await?;
    coordinator.arm_ctrl_c();
    let weapons = resolve_weapons(&coordinator, weapons)?;

    if check_only {
        let stale = coordinator.check_for_updates(&weapons).await;
        if format.is_json() {
            let value = serde_json::json!({
                "checked": weapons.len(),
                "stale": stale,
            });
            println!("{}", format.render(&value)?);
        } else {
            let style = OutputStyle::new();
            for name in &stale {
                println!("{name}");
            }
            println!(
                "{}",
                output::format_count_badge(stale.len(), "stale asset", &style)
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    if update_keys {
        let (_, failed) = coordinator.ensure_keys(&weapons, false).await?;
        if !failed.is_empty() {
            warn!(
                "{} weapons have no key; their downloads will not decrypt",
                failed.len()
            );
        }
    }

    let progress = if format.is_json() {
        None
    } else {
        let bar = ProgressBar::new(weapons.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        Some(bar)
    };

    let outcome = coordinator
        .download_stage(&weapons, batch_size, continue_on_error, progress.as_ref())
        .await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if format.is_json() {
        println!("{}", format.render(&serde_json::to_value(&outcome)?)?);
    } else {
        let style = OutputStyle::new();
        println!(
            "{} {}",
            output::format_success("Downloaded", &style),
            output::format_count_badge(outcome.successful.len(), "asset", &style)
        );
        if !outcome.failed.is_empty() {
            println!(
                "{}",
                output::format_error(&format!("Failed: {}", outcome.failed.join(", ")), &style)
            );
        }
        if outcome.cancelled {
            println!(
                "{}",
                output::format_warning("Cancelled before all batches ran", &style)
            );
        }
    }

    if outcome.cancelled {
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }
    Ok(strict_exit(strict, !outcome.failed.is_empty()))
}
