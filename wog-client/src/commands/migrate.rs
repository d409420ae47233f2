use std::process::ExitCode;

use anyhow::Result;

use crate::OutputFormat;
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Import legacy weapons.txt and keys.txt into the cache.
pub async fn handle(config: WogConfig, format: OutputFormat) -> Result<ExitCode> {
    let mut coordinator = Coordinator::new(config, default_reader()).await?;
    let imported = coordinator.migrate_legacy().await?;
    let stats = coordinator.stats();

    if format.is_json() {
        let value = serde_json::json!({
            "imported": imported,
            "weapon_count": stats.weapon_count,
            "key_count": stats.key_count,
        });
        println!("{}", format.render(&value)?);
    } else if imported {
        let style = OutputStyle::new();
        println!(
            "{}",
            output::format_success(
                &format!(
                    "Imported legacy data: {} weapons, {} keys",
                    stats.weapon_count, stats.key_count
                ),
                &style
            )
        );
    } else {
        println!("No legacy text files found; nothing to import");
    }

    Ok(ExitCode::SUCCESS)
}
