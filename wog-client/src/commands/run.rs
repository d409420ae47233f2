use std::process::ExitCode;

use anyhow::Result;

use crate::OutputFormat;
use crate::commands::{EXIT_CANCELLED, strict_exit};
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::{Coordinator, RunOptions, RunReport};
use crate::reader::default_reader;

/// Run the full catalogue, keys, download, decrypt pipeline.
pub async fn handle(
    skip_download: bool,
    skip_decrypt: bool,
    batch_size: usize,
    continue_on_error: bool,
    config: WogConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let strict = config.strict;
    let mut coordinator = Coordinator::new(config, default_reader()).await?;
    coordinator.arm_ctrl_c();

    let options = RunOptions {
        force_catalogue: false,
        skip_download,
        skip_decrypt,
        batch_size,
        continue_on_error,
    };
    let report = coordinator.run(options).await?;

    if format.is_json() {
        println!("{}", format.render(&serde_json::to_value(&report)?)?);
    } else {
        print_report(&report);
    }

    if report.cancelled {
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }
    Ok(strict_exit(strict, report.has_failures()))
}

fn print_report(report: &RunReport) {
    let style = OutputStyle::new();
    output::print_section_header("Run Report", &style);

    let mut table = output::create_table(&style);
    table.set_header(vec![
        output::header_cell("Stage", &style),
        output::header_cell("Succeeded", &style),
        output::header_cell("Failed", &style),
    ]);
    table.add_row(vec![
        output::regular_cell("Catalogue"),
        output::numeric_cell(&report.catalogue_size.to_string()),
        output::numeric_cell("-"),
    ]);
    table.add_row(vec![
        output::regular_cell("Keys"),
        output::numeric_cell(&report.keys_cached.to_string()),
        output::numeric_cell(&report.keys_failed.len().to_string()),
    ]);
    table.add_row(vec![
        output::regular_cell("Download"),
        output::numeric_cell(&report.downloaded.len().to_string()),
        output::numeric_cell(&report.download_failed.len().to_string()),
    ]);
    table.add_row(vec![
        output::regular_cell("Decrypt"),
        output::numeric_cell(&report.decrypted_files.to_string()),
        output::numeric_cell(&report.decrypt_failed.len().to_string()),
    ]);
    println!("{table}");

    if report.cancelled {
        println!(
            "{}",
            output::format_warning("Run cancelled; results above are partial", &style)
        );
    }
}
