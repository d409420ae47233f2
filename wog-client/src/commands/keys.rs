use std::process::ExitCode;

use anyhow::Result;

use crate::OutputFormat;
use crate::commands::{resolve_weapons, strict_exit};
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Fetch decryption keys for the requested weapons.
pub async fn handle(
    weapons: Option<Vec<String>>,
    refresh: bool,
    config: WogConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let strict = config.strict;
    let mut coordinator = Coordinator::new(config, default_reader()).await?;
    let weapons = resolve_weapons(&coordinator, weapons)?;

    let (keys, failed) = coordinator.ensure_keys(&weapons, refresh).await?;

    if format.is_json() {
        let value = serde_json::json!({
            "key_count": keys.len(),
            "requested": weapons.len(),
            "failed": failed,
        });
        println!("{}", format.render(&value)?);
    } else {
        let style = OutputStyle::new();
        println!(
            "{} {}",
            output::format_success("Keys cached", &style),
            output::format_count_badge(keys.len(), "key", &style)
        );
        if !failed.is_empty() {
            println!(
                "{}",
                output::format_warning(
                    &format!("No key issued for: {}", failed.join(", ")),
                    &style
                )
            );
        }
    }

    Ok(strict_exit(strict, !failed.is_empty()))
}
