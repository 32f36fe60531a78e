//! Bounded multi-stage pipeline core.
//!
//! A stage maps an ordered list of items through an async function with a
//! fixed ceiling on in-flight calls. Stages run one after another; each owns
//! a slice of the overall 0..100 progress scale.

mod progress;
mod runner;

pub use progress::{weighted_percent, ProgressEvent, ProgressTracker};
pub use runner::{run_stage, StageError, StageSpec};
