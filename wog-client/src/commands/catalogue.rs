use std::process::ExitCode;

use anyhow::Result;

use crate::OutputFormat;
use crate::config::WogConfig;
use crate::output::{self, OutputStyle};
use crate::pipeline::Coordinator;
use crate::reader::default_reader;

/// Refresh the weapon catalogue and print it.
pub async fn handle(force: bool, config: WogConfig, format: OutputFormat) -> Result<ExitCode> {
    let mut coordinator = Coordinator::new(config, default_reader()).await?;
    let catalogue = coordinator.refresh_catalogue(force).await?;

    if format.is_json() {
        let value = serde_json::json!({
            "count": catalogue.len(),
            "weapons": catalogue,
        });
        println!("{}", format.render(&value)?);
    } else {
        let style = OutputStyle::new();
        for name in &catalogue {
            println!("{name}");
        }
        println!(
            "{} {}",
            output::format_success("Catalogue refreshed", &style),
            output::format_count_badge(catalogue.len(), "weapon", &style)
        );
    }

    Ok(ExitCode::SUCCESS)
}
