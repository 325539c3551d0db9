use clap::Parser;
use std::path::PathBuf;

use super::defaults::{DEFAULT_LOG_SAMPLING, DEFAULT_STATUS_CODE};
use super::parsers::{
    parse_form_field, parse_header, parse_positive_u64, parse_positive_usize, parse_sampling,
};
use super::types::{FormField, HttpMethod, HttpVersion, PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Concurrent HTTP load generator with staggered ramp-up/ramp-down, streaming latency statistics, and a clean connection drain.",
    next_help_heading = "Advanced Options"
)]
pub struct SurgeArgs {
    /// Target URL
    #[arg(long, short, help_heading = "Common Options")]
    pub url: Option<String>,

    /// HTTP method to use
    #[arg(
        long,
        short = 'X',
        default_value = "get",
        ignore_case = true,
        help_heading = "Common Options"
    )]
    pub method: HttpMethod,

    /// HTTP headers in 'Key: Value' format (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header, help_heading = "Common Options")]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(long, default_value = "", help_heading = "Common Options")]
    pub data: String,

    /// Content-Type header (multipart/form-data and x-www-form-urlencoded use --form)
    #[arg(long = "content-type")]
    pub content_type: Option<String>,

    /// Form field 'name=value', or '@name=path' for a file part (repeatable)
    #[arg(long = "form", short = 'F', value_parser = parse_form_field, conflicts_with = "data")]
    pub form: Vec<FormField>,

    /// Number of concurrent workers
    #[arg(
        long,
        short = 'c',
        default_value = "1",
        value_parser = parse_positive_usize,
        help_heading = "Common Options"
    )]
    pub concurrency: PositiveUsize,

    /// Total run duration in seconds
    #[arg(
        long,
        short = 'd',
        default_value = "10",
        value_parser = parse_positive_u64,
        help_heading = "Common Options"
    )]
    pub duration: PositiveU64,

    /// Ramp-up (and ramp-down) duration in seconds
    #[arg(long, short = 'r', default_value_t = 0, help_heading = "Common Options")]
    pub ramp: u64,

    /// Connection establishment timeout in seconds
    #[arg(long = "dial-timeout", default_value = "3", value_parser = parse_positive_u64)]
    pub dial_timeout: PositiveU64,

    /// Per-request timeout in seconds (unset means no timeout)
    #[arg(long, value_parser = parse_positive_u64)]
    pub timeout: Option<PositiveU64>,

    /// HTTP protocol version
    #[arg(long = "http-version", default_value = "1.1", value_enum)]
    pub http_version: HttpVersion,

    /// Response code counted as a match
    #[arg(long = "status", default_value_t = DEFAULT_STATUS_CODE)]
    pub status: u16,

    /// Fixed pause in milliseconds before every request of a worker
    #[arg(long = "spacing-ms", default_value_t = 0)]
    pub spacing_ms: u64,

    /// Write sampled attempts and the final report to this JSON file
    #[arg(long, short = 'O')]
    pub output: Option<PathBuf>,

    /// Probability (0 < p <= 1) that an attempt is written to --output
    #[arg(
        long = "log-sampling",
        default_value_t = DEFAULT_LOG_SAMPLING,
        value_parser = parse_sampling,
        allow_negative_numbers = true
    )]
    pub log_sampling: f64,

    /// Report byte counts in IEC units (KiB, MiB, ...)
    #[arg(long = "binary-units")]
    pub binary_units: bool,

    /// Skip the remote preflight sample
    #[arg(long = "skip-preflight")]
    pub skip_preflight: bool,

    /// Disable the live progress line
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Path to a TOML or JSON config file
    #[arg(long, short = 'C', env = "SURGE_CONFIG", help_heading = "Common Options")]
    pub config: Option<String>,
}
