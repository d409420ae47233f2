use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use wog_client::{Commands, DEFAULT_CONCURRENCY, OutputFormat, WogConfig, commands};

#[derive(Parser)]
#[command(
    name = "wog",
    about = "Asset pipeline client for World of Guns: Gun Disassembly",
    version,
    author,
    long_about = "A command-line tool for mirroring World of Guns weapon assets: \
                  it refreshes the weapon catalogue, exchanges per-weapon decryption \
                  keys with the game's sync endpoint, downloads stale asset bundles \
                  in polite batches, and decrypts the extracted payloads."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Base directory for assets and cache state
    #[arg(short, long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Concurrent network operations (1-16)
    #[arg(short, long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Treat any per-item failure as a run failure
    #[arg(long, global = true)]
    strict: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    // Install ring crypto provider for reqwest/rustls (idempotent)
    let _ = rustls::crypto::ring::default_provider().install_default();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = WogConfig::new(cli.base_dir)
        .with_concurrency(cli.concurrency)
        .with_strict(cli.strict);
    let format = cli.format;

    match cli.command {
        Commands::Catalogue { force } => commands::catalogue::handle(force, config, format).await,
        Commands::Keys { weapons, refresh } => {
            commands::keys::handle(weapons, refresh, config, format).await
        }
        Commands::Download {
            weapons,
            update_keys,
            check_only,
            batch_size,
            continue_on_error,
        } => {
            commands::download::handle(
                weapons,
                update_keys,
                check_only,
                batch_size,
                continue_on_error,
                config,
                format,
            )
            .await
        }
        Commands::Decrypt {
            weapons,
            update_keys,
        } => commands::decrypt::handle(weapons, update_keys, config, format).await,
        Commands::Run {
            skip_download,
            skip_decrypt,
            batch_size,
            continue_on_error,
        } => {
            commands::run::handle(
                skip_download,
                skip_decrypt,
                batch_size,
                continue_on_error,
                config,
                format,
            )
            .await
        }
        Commands::Info => commands::info::handle(config, format).await,
        Commands::Migrate => commands::migrate::handle(config, format).await,
        Commands::Cleanup => commands::cleanup::handle(config, format).await,
    }
}
