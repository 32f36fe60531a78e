//! Extraction service types and errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::ocr::{OcrError, RasterizationError};
use crate::services::aggregate::AggregationError;

/// Run-level failure: which stage broke, and on which document or image.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(
        "{} and {} would both write page images to {}",
        first.display(),
        second.display(),
        prefix.display()
    )]
    SharedPrefix {
        prefix: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{stage} failed on {}: {source}", item.display())]
    Rasterization {
        stage: String,
        item: PathBuf,
        #[source]
        source: RasterizationError,
    },

    #[error("{stage} failed on {}: {source}", item.display())]
    Ocr {
        stage: String,
        item: PathBuf,
        #[source]
        source: OcrError,
    },

    #[error("{stage}: worker task failed: {source}")]
    Worker {
        stage: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

impl PipelineError {
    /// Label of the phase that failed.
    pub fn stage(&self) -> &str {
        match self {
            PipelineError::Discovery(_) | PipelineError::SharedPrefix { .. } => {
                super::PHASE_DISCOVER
            }
            PipelineError::Rasterization { stage, .. }
            | PipelineError::Ocr { stage, .. }
            | PipelineError::Worker { stage, .. } => stage,
            PipelineError::Aggregation(_) => super::PHASE_WRITE,
        }
    }

    /// Document or image the failure is attributed to, when known.
    pub fn item(&self) -> Option<&std::path::Path> {
        match self {
            PipelineError::Rasterization { item, .. } | PipelineError::Ocr { item, .. } => {
                Some(item.as_path())
            }
            PipelineError::SharedPrefix { second, .. } => Some(second.as_path()),
            _ => None,
        }
    }
}

/// Outcome of the rasterize step for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterOutcome {
    /// First page image.
    pub image: PathBuf,
    /// True when the image already existed and the rasterizer was skipped.
    pub cached: bool,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub documents: usize,
    pub rasterized: usize,
    pub cached: usize,
    pub texts: usize,
    pub addresses: usize,
    pub output: PathBuf,
}
