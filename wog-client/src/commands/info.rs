use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use crate::OutputFormat;
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Show configuration, cache state, and local file counts.
pub async fn handle(config: WogConfig, format: OutputFormat) -> Result<ExitCode> {
    let coordinator = Coordinator::new(config, default_reader()).await?;
    let config = coordinator.config();
    let stats = coordinator.stats();

    let assets = count_files(&config.assets_dir(), "unity3d").await;
    let encrypted = count_files(&config.encrypted_dir(), "bytes").await;
    let decrypted = count_files(&config.decrypted_dir(), "unity3d").await;

    if format.is_json() {
        let value = serde_json::json!({
            "base_dir": config.base_dir.display().to_string(),
            "config": config.snapshot(),
            "cache": serde_json::to_value(&stats)?,
            "files": {
                "assets": assets,
                "encrypted": encrypted,
                "decrypted": decrypted,
            },
        });
        println!("{}", format.render(&value)?);
        return Ok(ExitCode::SUCCESS);
    }

    let style = OutputStyle::new();

    output::print_section_header("Configuration", &style);
    println!(
        "{}",
        output::format_key_value(
            "Base directory",
            &config.base_dir.display().to_string(),
            &style
        )
    );
    println!(
        "{}",
        output::format_key_value("Data host", &config.data_url, &style)
    );
    println!(
        "{}",
        output::format_key_value("Key endpoint", &config.api_url, &style)
    );
    println!(
        "{}",
        output::format_key_value("Concurrency", &config.concurrency.to_string(), &style)
    );
    println!(
        "{}",
        output::format_key_value("Batch size", &config.batch_size.to_string(), &style)
    );
    println!(
        "{}",
        output::format_key_value("Strict mode", &config.strict.to_string(), &style)
    );

    output::print_section_header("Cache", &style);
    let mut table = output::create_table(&style);
    table.set_header(vec![
        output::header_cell("Section", &style),
        output::header_cell("Count", &style),
        output::header_cell("Detail", &style),
    ]);
    table.add_row(vec![
        output::regular_cell("Weapons"),
        output::numeric_cell(&stats.weapon_count.to_string()),
        output::regular_cell(stats.source_asset.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![
        output::regular_cell("Keys"),
        output::numeric_cell(&stats.key_count.to_string()),
        output::regular_cell(if stats.validation_enabled {
            "validated"
        } else {
            "unvalidated"
        }),
    ]);
    println!("{table}");
    println!(
        "{}",
        output::format_key_value("Last updated", &stats.updated_at.to_rfc3339(), &style)
    );
    println!(
        "{}",
        output::format_key_value("Schema version", &stats.version, &style)
    );
    if stats.expired {
        println!(
            "{}",
            output::format_warning("Cache is past its advisory age; consider a refresh", &style)
        );
    }

    output::print_section_header("Files", &style);
    println!(
        "{}",
        output::format_key_value("Downloaded assets", &assets.to_string(), &style)
    );
    println!(
        "{}",
        output::format_key_value("Encrypted payloads", &encrypted.to_string(), &style)
    );
    println!(
        "{}",
        output::format_key_value("Decrypted bundles", &decrypted.to_string(), &style)
    );

    Ok(ExitCode::SUCCESS)
}

/// Count files with one extension; a missing directory counts zero.
async fn count_files(dir: &Path, extension: &str) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };

    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().extension().and_then(|e| e.to_str()) == Some(extension) {
            count += 1;
        }
    }
    count
}
