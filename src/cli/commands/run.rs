//! The `run` command: full extraction with a console progress bar.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::pipeline::ProgressEvent;
use crate::services::{ExtractionService, PipelineError};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Root directory containing PDFs (default: ./pdfs)
    pub root: Option<PathBuf>,
    /// Output file for the address list (default: emails.txt)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Concurrent pdftoppm processes
    #[arg(long)]
    pub raster_workers: Option<usize>,
    /// Concurrent tesseract processes
    #[arg(long)]
    pub ocr_workers: Option<usize>,
    /// Tesseract language
    #[arg(long)]
    pub lang: Option<String>,
    /// Longest page image side in pixels
    #[arg(long)]
    pub scale: Option<u32>,
    /// Per tool call time limit in seconds (0 = none)
    #[arg(long)]
    pub timeout: Option<u64>,
    /// pdftoppm binary
    #[arg(long, env = "PDFMAIL_PDFTOPPM")]
    pub pdftoppm: Option<String>,
    /// tesseract binary
    #[arg(long, env = "PDFMAIL_TESSERACT")]
    pub tesseract: Option<String>,
    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of loaded settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref root) = self.root {
            settings.documents_dir = root.clone();
        }
        if let Some(ref output) = self.output {
            settings.output_file = output.clone();
        }
        if let Some(workers) = self.raster_workers {
            settings.rasterize_workers = workers;
        }
        if let Some(workers) = self.ocr_workers {
            settings.ocr_workers = workers;
        }
        if let Some(ref lang) = self.lang {
            settings.language = lang.clone();
        }
        if let Some(scale) = self.scale {
            settings.scale_to = scale;
        }
        if let Some(secs) = self.timeout {
            settings.tool_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ref binary) = self.pdftoppm {
            settings.pdftoppm_binary = binary.clone();
        }
        if let Some(ref binary) = self.tesseract {
            settings.tesseract_binary = binary.clone();
        }
    }
}

/// Extract addresses from every PDF under the configured root.
pub async fn cmd_run(mut settings: Settings, args: RunArgs) -> anyhow::Result<()> {
    args.apply_to_settings(&mut settings);

    let service = ExtractionService::from_settings(&settings);

    // Create event channel for progress tracking
    let (event_tx, mut event_rx) = mpsc::channel::<ProgressEvent>(100);

    let show_progress = !args.no_progress;
    let event_handler = tokio::spawn(async move {
        let progress = if show_progress {
            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("progress [{bar:40.cyan/blue}] {pos}% | ETA: {eta} | {wide_msg}")
                    .unwrap()
                    .progress_chars("█▓░"),
            );
            Some(pb)
        } else {
            None
        };

        while let Some(event) = event_rx.recv().await {
            tracing::debug!("{}% {}", event.percent, event.label);
            if let Some(ref pb) = progress {
                pb.set_position(u64::from(event.percent));
                pb.set_message(event.label);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
    });

    let result = service
        .process(&settings.documents_dir, &settings.output_file, event_tx)
        .await;

    // Sender is gone once process returns; wait for the bar to clear
    join_progress(event_handler).await;

    match result {
        Ok(summary) => {
            println!(
                "{} finished, wrote {} email addresses to {}",
                style("✓").green(),
                summary.addresses,
                summary.output.display()
            );
            println!(
                "  {} documents ({} rasterized, {} cached), {} pages read",
                summary.documents,
                summary.rasterized,
                summary.cached,
                summary.texts
            );
            Ok(())
        }
        Err(e) => {
            report_failure(&e);
            Err(e.into())
        }
    }
}

/// Wait for the progress display task. Returns false if it panicked.
async fn join_progress(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Progress display task failed: {}", e);
            false
        }
    }
}

fn report_failure(err: &PipelineError) {
    eprintln!(
        "{} failed to extract emails from pdfs during '{}'",
        style("✗").red(),
        err.stage()
    );
    if let Some(item) = err.item() {
        eprintln!("  {} {}", style("item:").dim(), item.display());
    }
    eprintln!("  {} no output written", style("!").yellow());
}
