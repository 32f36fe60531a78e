//! External tool adapters: rasterization and OCR.
//!
//! Both collaborators sit behind small async traits so the pipeline can be
//! driven by fakes in tests:
//! - [`Rasterizer`]: PDF to page images, backed by `pdftoppm` (Poppler)
//! - [`TextExtractor`]: image to text, backed by `tesseract`

mod rasterizer;
mod tesseract;
mod tools;

pub use rasterizer::{PdftoppmRasterizer, RasterizationError, Rasterizer, RasterizerConfig};
pub use tesseract::{OcrError, TesseractConfig, TesseractExtractor, TextExtractor};
pub use tools::{check_binary, check_tools, CommandError};
