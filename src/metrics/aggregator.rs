use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::AppResult;

use super::histogram::LatencyHistogram;
use super::types::{LatencyQuantiles, LatencySummary, Rate, ReqAttempt, ReqStats};
use super::welford::OnlineVariance;
use super::window::DecayingCounter;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Running statistics over the attempt stream.
///
/// `update` takes `&mut self`, so the borrow checker enforces the single
/// writer: only the coordinator that owns the aggregator can feed it. The
/// sliding-window counters are the only state touched from other tasks.
#[derive(Debug)]
pub struct StatsAggregator {
    started_at: DateTime<Utc>,
    target_status: u16,
    elapsed: Duration,
    total_attempts: u64,
    mean_attempts_per_sec: u64,
    attempts_window: DecayingCounter,
    sum_bytes_read: u64,
    mean_bytes_read_per_sec: u64,
    max_bytes_read_per_sec: u64,
    bytes_read_window: DecayingCounter,
    sum_bytes_written: u64,
    mean_bytes_written_per_sec: u64,
    max_bytes_written_per_sec: u64,
    bytes_written_window: DecayingCounter,
    latency: OnlineVariance,
    latency_min_ns: Option<u64>,
    digest: LatencyHistogram,
    digest_failures: u64,
    matching_codes: u64,
    matching_pct: f64,
    error_count: u64,
    error_pct: f64,
    error_types: BTreeMap<String, u64>,
}

impl StatsAggregator {
    /// Creates an empty aggregator for a run that started at `started_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the latency digest cannot be allocated.
    pub fn new(started_at: DateTime<Utc>, target_status: u16) -> AppResult<Self> {
        Ok(Self {
            started_at,
            target_status,
            elapsed: Duration::ZERO,
            total_attempts: 0,
            mean_attempts_per_sec: 0,
            attempts_window: DecayingCounter::new(),
            sum_bytes_read: 0,
            mean_bytes_read_per_sec: 0,
            max_bytes_read_per_sec: 0,
            bytes_read_window: DecayingCounter::new(),
            sum_bytes_written: 0,
            mean_bytes_written_per_sec: 0,
            max_bytes_written_per_sec: 0,
            bytes_written_window: DecayingCounter::new(),
            latency: OnlineVariance::new(),
            latency_min_ns: None,
            digest: LatencyHistogram::new()?,
            digest_failures: 0,
            matching_codes: 0,
            matching_pct: 0.0,
            error_count: 0,
            error_pct: 0.0,
            error_types: BTreeMap::new(),
        })
    }

    /// Folds one attempt into the statistics. Never blocks.
    pub fn update(&mut self, attempt: &ReqAttempt, now: DateTime<Utc>) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.elapsed = now
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        self.mean_attempts_per_sec = per_second(self.total_attempts, self.elapsed);
        self.attempts_window.record(1);

        self.sum_bytes_read = self.sum_bytes_read.saturating_add(attempt.res_bytes);
        self.mean_bytes_read_per_sec = per_second(self.sum_bytes_read, self.elapsed);
        self.bytes_read_window.record(attempt.res_bytes);
        self.max_bytes_read_per_sec = self
            .max_bytes_read_per_sec
            .max(self.bytes_read_window.max())
            .max(self.mean_bytes_read_per_sec);

        self.sum_bytes_written = self.sum_bytes_written.saturating_add(attempt.req_bytes);
        self.mean_bytes_written_per_sec = per_second(self.sum_bytes_written, self.elapsed);
        self.bytes_written_window.record(attempt.req_bytes);
        self.max_bytes_written_per_sec = self
            .max_bytes_written_per_sec
            .max(self.bytes_written_window.max())
            .max(self.mean_bytes_written_per_sec);

        let latency_ns = u64::try_from(attempt.elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.latency.add(latency_ns as f64);
        self.latency_min_ns = Some(
            self.latency_min_ns
                .map_or(latency_ns, |current| current.min(latency_ns)),
        );
        if let Err(err) = self.digest.record(latency_ns) {
            self.digest_failures = self.digest_failures.saturating_add(1);
            if self.digest_failures == 1 {
                warn!("Latency digest rejected a sample: {}", err);
            }
        }

        if attempt.res_code == self.target_status {
            self.matching_codes = self.matching_codes.saturating_add(1);
        }
        self.matching_pct = percent(self.matching_codes, self.total_attempts);

        if attempt.is_error() {
            self.error_count = self.error_count.saturating_add(1);
            let entry = self
                .error_types
                .entry(attempt.res_err.clone())
                .or_insert(0);
            *entry = entry.saturating_add(1);
        }
        self.error_pct = percent(self.error_count, self.total_attempts);
    }

    #[must_use]
    pub const fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Live view including the sliding-window rates.
    #[must_use]
    pub fn snapshot(&self) -> ReqStats {
        self.build_stats(false)
    }

    /// Final view: current rates are zero because the run is over, and the
    /// serialized digest is attached.
    #[must_use]
    pub fn finalize(&self) -> ReqStats {
        let mut stats = self.build_stats(true);
        stats.latency_digest = match self.digest.encode_base64() {
            Ok(encoded) => Some(encoded),
            Err(err) => {
                warn!("Failed to encode latency digest: {}", err);
                None
            }
        };
        stats
    }

    fn build_stats(&self, finished: bool) -> ReqStats {
        let current = |counter: &DecayingCounter| if finished { 0 } else { counter.current() };
        ReqStats {
            elapsed: self.elapsed,
            total_attempts: self.total_attempts,
            attempts_per_sec: Rate {
                current: current(&self.attempts_window),
                mean: self.mean_attempts_per_sec,
                max: self.attempts_window.max(),
            },
            sum_bytes_read: self.sum_bytes_read,
            bytes_read_per_sec: Rate {
                current: current(&self.bytes_read_window),
                mean: self.mean_bytes_read_per_sec,
                max: self.max_bytes_read_per_sec,
            },
            sum_bytes_written: self.sum_bytes_written,
            bytes_written_per_sec: Rate {
                current: current(&self.bytes_written_window),
                mean: self.mean_bytes_written_per_sec,
                max: self.max_bytes_written_per_sec,
            },
            latency: self.latency_summary(),
            latency_digest: None,
            matching_codes: self.matching_codes,
            matching_pct: self.matching_pct,
            error_count: self.error_count,
            error_pct: self.error_pct,
            error_types: self.error_types.clone(),
        }
    }

    fn latency_summary(&self) -> LatencySummary {
        let digest = &self.digest;
        LatencySummary {
            count: self.latency.count(),
            min_ns: self.latency_min_ns.unwrap_or(0),
            mean_ns: self.latency.mean(),
            stddev_ns: self.latency.stddev(),
            population_stddev_ns: self.latency.population_stddev(),
            cv: self.latency.cv(),
            stderr_ns: self.latency.stderr(),
            quantiles: LatencyQuantiles {
                p10: digest.quantile(0.10),
                p16: digest.quantile(0.16),
                p25: digest.quantile(0.25),
                p50: digest.quantile(0.50),
                p75: digest.quantile(0.75),
                p84: digest.quantile(0.84),
                p90: digest.quantile(0.90),
                p99: digest.quantile(0.99),
                max: digest.max(),
            },
        }
    }
}

/// `floor(count / elapsed_seconds)`; zero before any time has passed.
fn per_second(count: u64, elapsed: Duration) -> u64 {
    let elapsed_ns = elapsed.as_nanos();
    if elapsed_ns == 0 {
        return 0;
    }
    let scaled = u128::from(count).saturating_mul(NANOS_PER_SEC);
    u64::try_from(scaled.checked_div(elapsed_ns).unwrap_or(0)).unwrap_or(u64::MAX)
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}
