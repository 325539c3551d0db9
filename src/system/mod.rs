//! Process-level concerns: logging, host resource limits, and the remote preflight sample.
pub mod limits;
pub mod logger;
pub mod preflight;

pub use limits::{
    ResourceLimits, detect_resource_limits, log_resource_report, predicted_memory_bytes,
    resource_warnings,
};
pub use logger::init_logging;
pub use preflight::{NOT_DETECTED, PREFLIGHT_TIMEOUT, RemoteSample, sample_remote};
