//! Tesseract OCR backend.
//!
//! Uses Tesseract via command-line for text extraction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use super::tools::{check_binary, run_command, stderr_text, CommandError};

/// Errors that can occur during OCR.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed on {image}: {message}")]
    OcrFailed { image: String, message: String },

    #[error(transparent)]
    Command(CommandError),
}

impl From<CommandError> for OcrError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound(tool) => {
                OcrError::BackendNotAvailable(format!("{} not found (install tesseract-ocr)", tool))
            }
            other => OcrError::Command(other),
        }
    }
}

/// Converts one image into raw text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Recognize text in `image`, using `language` as the OCR language hint.
    async fn extract_text(&self, image: &Path, language: &str) -> Result<String, OcrError>;
}

/// Settings for [`TesseractExtractor`].
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// tesseract binary name or path.
    pub binary: String,
    /// OCR engine mode (`--oem`). 1 selects the LSTM engine.
    pub engine_mode: u8,
    /// Page segmentation mode (`--psm`). 3 is fully automatic.
    pub page_segmentation: u8,
    /// Per-image time limit.
    pub timeout: Option<Duration>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            engine_mode: 1,
            page_segmentation: 3,
            timeout: None,
        }
    }
}

/// Tesseract OCR backend.
#[derive(Debug, Clone, Default)]
pub struct TesseractExtractor {
    config: TesseractConfig,
}

impl TesseractExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn is_available(&self) -> bool {
        check_binary(&self.config.binary)
    }

    pub fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("{} is available", self.config.binary)
        } else {
            format!(
                "{} not installed. Install with: apt install tesseract-ocr",
                self.config.binary
            )
        }
    }

    fn args(&self, image: &Path, language: &str) -> Vec<std::ffi::OsString> {
        vec![
            image.as_os_str().to_os_string(),
            "stdout".into(),
            "-l".into(),
            language.into(),
            "--oem".into(),
            self.config.engine_mode.to_string().into(),
            "--psm".into(),
            self.config.page_segmentation.to_string().into(),
        ]
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn extract_text(&self, image: &Path, language: &str) -> Result<String, OcrError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(self.args(image, language));

        let output = run_command(cmd, &self.config.binary, self.config.timeout).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(OcrError::OcrFailed {
                image: image.display().to_string(),
                message: format!("tesseract failed ({}): {}", output.status, stderr_text(&output)),
            })
        }
    }
}
