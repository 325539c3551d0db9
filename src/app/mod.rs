//! Wiring for a local run: progress rendering, the final summary, and number formatting.
pub mod format;
pub mod progress;
pub mod runner;
pub mod summary;

pub use runner::{new_run_id, run_local};
pub use summary::{RunSummary, print_summary, summary_lines};
