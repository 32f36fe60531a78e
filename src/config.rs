//! Configuration management for pdfmail using the prefer crate.
//!
//! [`Settings`] holds the resolved runtime values. A [`Config`] file
//! (`pdfmail.toml`, `.yaml` or `.json`) is discovered by prefer and layered
//! over the defaults; CLI flags are applied last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::{ImageLayout, DEFAULT_DOCUMENT_TOKEN, DEFAULT_IMAGE_TOKEN};
use crate::ocr::{RasterizerConfig, TesseractConfig};

/// Name prefer uses to discover config files.
pub const CONFIG_NAME: &str = "pdfmail";

/// Default number of concurrent calls per stage.
pub const DEFAULT_WORKERS: usize = 10;

/// Errors that can occur while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the document tree.
    pub documents_dir: PathBuf,
    /// Destination of the address list.
    pub output_file: PathBuf,
    /// Extension of source documents.
    pub document_extension: String,
    /// Directory name marking the document tree.
    pub document_token: String,
    /// Directory name that replaces `document_token` for page images.
    pub image_token: String,
    /// Concurrent pdftoppm processes.
    pub rasterize_workers: usize,
    /// Concurrent tesseract processes.
    pub ocr_workers: usize,
    /// Tesseract language.
    pub language: String,
    /// Tesseract OCR engine mode.
    pub ocr_engine_mode: u8,
    /// Tesseract page segmentation mode.
    pub page_segmentation: u8,
    /// Longest page image side in pixels.
    pub scale_to: u32,
    /// pdftoppm binary name or path.
    pub pdftoppm_binary: String,
    /// tesseract binary name or path.
    pub tesseract_binary: String,
    /// Time limit for a single external tool call.
    pub tool_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./pdfs"),
            output_file: PathBuf::from("emails.txt"),
            document_extension: "pdf".to_string(),
            document_token: DEFAULT_DOCUMENT_TOKEN.to_string(),
            image_token: DEFAULT_IMAGE_TOKEN.to_string(),
            rasterize_workers: DEFAULT_WORKERS,
            ocr_workers: DEFAULT_WORKERS,
            language: "eng".to_string(),
            ocr_engine_mode: 1,
            page_segmentation: 3,
            scale_to: 3000,
            pdftoppm_binary: "pdftoppm".to_string(),
            tesseract_binary: "tesseract".to_string(),
            tool_timeout: None,
        }
    }
}

impl Settings {
    pub fn image_layout(&self) -> ImageLayout {
        ImageLayout::new(&self.document_token, &self.image_token)
    }

    pub fn rasterizer_config(&self) -> RasterizerConfig {
        RasterizerConfig {
            binary: self.pdftoppm_binary.clone(),
            scale_to: self.scale_to,
            timeout: self.tool_timeout,
        }
    }

    pub fn tesseract_config(&self) -> TesseractConfig {
        TesseractConfig {
            binary: self.tesseract_binary.clone(),
            engine_mode: self.ocr_engine_mode,
            page_segmentation: self.page_segmentation,
            timeout: self.tool_timeout,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rasterize_workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_engine_mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_segmentation: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_to: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdftoppm_binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tesseract_binary: Option<String>,
    /// Per tool call limit in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    ///
    /// A missing or unreadable config file falls back to defaults.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.documents_dir {
            settings.documents_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref file) = self.output_file {
            settings.output_file = self.resolve_path(file, base_dir);
        }
        if let Some(ref ext) = self.document_extension {
            settings.document_extension = ext.clone();
        }
        if let Some(ref token) = self.document_token {
            settings.document_token = token.clone();
        }
        if let Some(ref token) = self.image_token {
            settings.image_token = token.clone();
        }
        if let Some(workers) = self.rasterize_workers {
            settings.rasterize_workers = workers;
        }
        if let Some(workers) = self.ocr_workers {
            settings.ocr_workers = workers;
        }
        if let Some(ref language) = self.language {
            settings.language = language.clone();
        }
        if let Some(oem) = self.ocr_engine_mode {
            settings.ocr_engine_mode = oem;
        }
        if let Some(psm) = self.page_segmentation {
            settings.page_segmentation = psm;
        }
        if let Some(scale) = self.scale_to {
            settings.scale_to = scale;
        }
        if let Some(ref binary) = self.pdftoppm_binary {
            settings.pdftoppm_binary = binary.clone();
        }
        if let Some(ref binary) = self.tesseract_binary {
            settings.tesseract_binary = binary.clone();
        }
        if let Some(secs) = self.tool_timeout_secs {
            settings.tool_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }
}

/// Load settings from the discovered config file (if any) over defaults.
pub async fn load_settings() -> (Settings, Config) {
    let config = Config::load().await;
    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| PathBuf::from("."));
    config.apply_to_settings(&mut settings, &base_dir);
    (settings, config)
}
