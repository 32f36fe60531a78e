//! pdfmail library.
//!
//! The interesting part is [`pipeline`]: a bounded sliding-window stage
//! runner with driver-owned progress accounting. Everything around it is a
//! thin adapter over external tools (`pdftoppm`, `tesseract`) or the
//! filesystem.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod layout;
pub mod mining;
pub mod ocr;
pub mod pipeline;
pub mod services;

pub use config::{Config, Settings};
pub use discovery::{find_documents, DiscoveryError};
pub use layout::ImageLayout;
pub use mining::{AddressMiner, RegexAddressMiner};
pub use ocr::{
    OcrError, PdftoppmRasterizer, RasterizationError, Rasterizer, TesseractExtractor,
    TextExtractor,
};
pub use pipeline::{ProgressEvent, ProgressTracker, StageError, StageSpec};
pub use services::{AddressSet, AggregationError, ExtractionService, PipelineError, RunSummary};
