use std::process::ExitCode;

use anyhow::Result;

use crate::OutputFormat;
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Remove orphaned temporary files and undersized assets.
pub async fn handle(config: WogConfig, format: OutputFormat) -> Result<ExitCode> {
    let coordinator = Coordinator::new(config, default_reader()).await?;
    let removed = coordinator.cleanup().await?;

    if format.is_json() {
        println!("{}", format.render(&serde_json::json!({"removed": removed}))?);
    } else if removed > 0 {
        let style = OutputStyle::new();
        println!(
            "{} {}",
            output::format_success("Removed", &style),
            output::format_count_badge(removed, "file", &style)
        );
    } else {
        println!("Nothing to clean");
    }

    Ok(ExitCode::SUCCESS)
}
