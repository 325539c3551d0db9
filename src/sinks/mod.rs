//! Sampled per-attempt persistence.
mod attempt_log;


pub use attempt_log::{ATTEMPT_LOG_CAPACITY, AttemptLog, display_path, setup_attempt_writer};
