//! Service layer for pdfmail business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be driven by the CLI or embedded elsewhere.

pub mod aggregate;
pub mod extraction;

pub use aggregate::{write_addresses, AddressSet, AggregationError};
pub use extraction::{
    rasterize_cached, ExtractionOptions, ExtractionService, PipelineError, RasterOutcome,
    RunSummary,
};
