use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Outcome of one request/response cycle. Never mutated after a worker emits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReqAttempt {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    #[serde(rename = "elapsed_ns", serialize_with = "serialize_nanos")]
    pub elapsed: Duration,
    pub req_bytes: u64,
    pub res_bytes: u64,
    /// Zero when no response was received.
    pub res_code: u16,
    /// Classified transport error label; empty on success.
    pub res_err: String,
}

impl ReqAttempt {
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.res_err.is_empty()
    }
}

/// Latency quantiles in nanoseconds, read from the streaming digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyQuantiles {
    pub p10: u64,
    pub p16: u64,
    pub p25: u64,
    pub p50: u64,
    pub p75: u64,
    pub p84: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
}

/// Latency distribution summary; all values in nanoseconds except `cv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ns: u64,
    pub mean_ns: f64,
    pub stddev_ns: f64,
    pub population_stddev_ns: f64,
    pub cv: f64,
    pub stderr_ns: f64,
    pub quantiles: LatencyQuantiles,
}

/// Per-second rate triple: sliding-window current, run mean, and observed max.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub current: u64,
    pub mean: u64,
    pub max: u64,
}

/// Cumulative run statistics at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReqStats {
    #[serde(serialize_with = "serialize_nanos", rename = "elapsed_ns")]
    pub elapsed: Duration,
    pub total_attempts: u64,
    pub attempts_per_sec: Rate,
    pub sum_bytes_read: u64,
    pub bytes_read_per_sec: Rate,
    pub sum_bytes_written: u64,
    pub bytes_written_per_sec: Rate,
    pub latency: LatencySummary,
    /// Base64 HdrHistogram V2 payload; only filled in the final snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_digest: Option<String>,
    pub matching_codes: u64,
    pub matching_pct: f64,
    pub error_count: u64,
    pub error_pct: f64,
    pub error_types: BTreeMap<String, u64>,
}

fn serialize_nanos<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
}
