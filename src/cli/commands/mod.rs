//! CLI commands implementation.

mod check;
mod run;

pub use check::cmd_check;
pub use run::{cmd_run, RunArgs};
