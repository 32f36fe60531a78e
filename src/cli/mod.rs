//! Command-line interface.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, Config, Settings};

pub use commands::RunArgs;

#[derive(Parser)]
#[command(name = "pdfmail")]
#[command(about = "Extract email addresses from scanned PDF documents")]
#[command(version)]
pub struct Cli {
    /// Config file (skips discovery of pdfmail.toml/.yaml/.json)
    #[arg(long, global = true, env = "PDFMAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Rasterize, OCR and mine every PDF under a directory (default)
    Run(RunArgs),

    /// Check that pdftoppm and tesseract are installed
    Check,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(cli.config.as_deref()).await?;

    match cli.command {
        Some(Commands::Run(args)) => commands::cmd_run(settings, args).await,
        Some(Commands::Check) => commands::cmd_check(&settings),
        None => commands::cmd_run(settings, RunArgs::default()).await,
    }
}

/// Settings from an explicit config file, or from prefer discovery.
async fn resolve_settings(config_path: Option<&std::path::Path>) -> anyhow::Result<Settings> {
    let Some(path) = config_path else {
        let (settings, config) = load_settings().await;
        if let Some(ref source) = config.source_path {
            tracing::info!("Loaded config from {}", source.display());
        }
        return Ok(settings);
    };

    let config = Config::load_from_path(path).await?;
    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(|| PathBuf::from("."));
    config.apply_to_settings(&mut settings, &base_dir);
    Ok(settings)
}
