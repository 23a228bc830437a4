//! User-facing terminal output.

pub mod formatter;

pub use formatter::{BuildProgress, OutputFormatter, plan_lines};
