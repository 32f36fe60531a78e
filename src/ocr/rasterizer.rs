//! PDF rasterization via pdftoppm.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use super::tools::{check_binary, run_command, stderr_text, CommandError};
use crate::layout::first_page_candidates;

/// Errors that can occur while rasterizing a document.
#[derive(Debug, Error)]
pub enum RasterizationError {
    #[error("Rasterizer not available: {0}")]
    ToolNotFound(String),

    #[error("{tool} failed on {} ({status}): {stderr}", source_path.display())]
    Failed {
        tool: String,
        source_path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("No page image written for {} under {}", source_path.display(), prefix.display())]
    NoOutput { source_path: PathBuf, prefix: PathBuf },

    #[error(transparent)]
    Command(CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CommandError> for RasterizationError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound(tool) => {
                RasterizationError::ToolNotFound(format!("{} (install poppler-utils)", tool))
            }
            other => RasterizationError::Command(other),
        }
    }
}

/// Converts one document into a family of page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Rasterize `source`, writing pages as `<output_prefix>-<page>.png`.
    ///
    /// Returns the path of the first page image.
    async fn rasterize(
        &self,
        source: &Path,
        output_prefix: &Path,
    ) -> Result<PathBuf, RasterizationError>;
}

/// Settings for [`PdftoppmRasterizer`].
#[derive(Debug, Clone)]
pub struct RasterizerConfig {
    /// pdftoppm binary name or path.
    pub binary: String,
    /// Longest side of each page image in pixels.
    pub scale_to: u32,
    /// Per-document time limit.
    pub timeout: Option<Duration>,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            binary: "pdftoppm".to_string(),
            scale_to: 3000,
            timeout: None,
        }
    }
}

/// Rasterizer backed by Poppler's `pdftoppm`.
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRasterizer {
    config: RasterizerConfig,
}

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RasterizerConfig) -> Self {
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
                "{} not installed. Install with: apt install poppler-utils",
                self.config.binary
            )
        }
    }

    fn args(&self, source: &Path, output_prefix: &Path) -> Vec<std::ffi::OsString> {
        let scale = self.config.scale_to.to_string();
        vec![
            "-png".into(),
            "-scale-to".into(),
            scale.into(),
            source.as_os_str().to_os_string(),
            output_prefix.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    async fn rasterize(
        &self,
        source: &Path,
        output_prefix: &Path,
    ) -> Result<PathBuf, RasterizationError> {
        if let Some(dir) = output_prefix.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(self.args(source, output_prefix));

        let output = run_command(cmd, &self.config.binary, self.config.timeout).await?;
        if !output.status.success() {
            return Err(RasterizationError::Failed {
                tool: self.config.binary.clone(),
                source_path: source.to_path_buf(),
                status: output.status.to_string(),
                stderr: stderr_text(&output),
            });
        }

        for candidate in first_page_candidates(output_prefix) {
            if tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        Err(RasterizationError::NoOutput {
            source_path: source.to_path_buf(),
            prefix: output_prefix.to_path_buf(),
        })
    }
}
