//! The `check` command: external tool availability.

use console::style;

use crate::config::Settings;
use crate::ocr::{check_tools, PdftoppmRasterizer, TesseractExtractor};

/// Report whether the rasterizer and OCR tools can be found.
pub fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("Tool Status").bold());
    println!("{}", "-".repeat(50));

    let tools = check_tools([
        settings.pdftoppm_binary.as_str(),
        settings.tesseract_binary.as_str(),
    ]);
    let mut all_found = true;

    for (tool, available) in &tools {
        let status = if *available {
            style("✓ found").green()
        } else {
            all_found = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    let rasterizer = PdftoppmRasterizer::with_config(settings.rasterizer_config());
    let extractor = TesseractExtractor::with_config(settings.tesseract_config());
    for (ok, hint) in [
        (rasterizer.is_available(), rasterizer.availability_hint()),
        (extractor.is_available(), extractor.availability_hint()),
    ] {
        if !ok {
            println!("                  {}", style(hint).dim());
        }
    }

    println!();
    println!(
        "  {:<15} {}",
        "language",
        style(&settings.language).cyan()
    );
    println!(
        "  {:<15} {}",
        "documents",
        settings.documents_dir.display()
    );
    println!();

    if all_found {
        println!("{} All tools are available", style("✓").green());
        Ok(())
    } else {
        anyhow::bail!("required tools are missing")
    }
}
