use serde::Serialize;

use crate::args::ByteUnits;
use crate::engine::RunReport;
use crate::system::RemoteSample;

use super::format::{
    format_bytes, format_elapsed, format_latency_ns, format_rate_bytes, group_thousands, pct_ceil,
    pct_floor,
};

/// Everything known about a finished run; also the `report` section of the attempt log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub target: String,
    pub concurrency: usize,
    pub remote: Option<RemoteSample>,
    pub report: RunReport,
}

pub fn print_summary(summary: &RunSummary, units: ByteUnits) {
    for line in summary_lines(summary, units) {
        println!("{}", line);
    }
}

#[must_use]
pub fn summary_lines(summary: &RunSummary, units: ByteUnits) -> Vec<String> {
    let report = &summary.report;
    let stats = &report.stats;
    let latency = &stats.latency;
    let mut lines = Vec::new();

    lines.push(format!("Run: {}", summary.run_id));
    lines.push(format!(
        "Target: {} ({} workers)",
        summary.target, summary.concurrency
    ));
    if let Some(remote) = summary.remote.as_ref() {
        lines.push(format!(
            "Remote: {} | server {} | {}",
            remote.remote_label(),
            remote.server_label(),
            remote.version_label()
        ));
    }
    lines.push(format!("Runtime: {}", format_elapsed(stats.elapsed)));
    lines.push(format!("Attempts: {}", group_thousands(stats.total_attempts)));
    lines.push(format!(
        "Throughput: {} current / {} mean / {} max req/s",
        group_thousands(stats.attempts_per_sec.current),
        group_thousands(stats.attempts_per_sec.mean),
        group_thousands(stats.attempts_per_sec.max)
    ));
    lines.push(format!(
        "Latency: p10 {} | p50 {} | p90 {} | p99 {}",
        format_latency_ns(latency.quantiles.p10 as f64),
        format_latency_ns(latency.quantiles.p50 as f64),
        format_latency_ns(latency.quantiles.p90 as f64),
        format_latency_ns(latency.quantiles.p99 as f64)
    ));
    lines.push(format!(
        "Latency mean: {} ± {}",
        format_latency_ns(latency.mean_ns),
        format_latency_ns(latency.stddev_ns)
    ));
    lines.push(format!(
        "Read: {} mean / {} max ({} total)",
        format_rate_bytes(stats.bytes_read_per_sec.mean, units),
        format_rate_bytes(stats.bytes_read_per_sec.max, units),
        format_bytes(stats.sum_bytes_read, units)
    ));
    lines.push(format!(
        "Write: {} mean / {} max ({} total)",
        format_rate_bytes(stats.bytes_written_per_sec.mean, units),
        format_rate_bytes(stats.bytes_written_per_sec.max, units),
        format_bytes(stats.sum_bytes_written, units)
    ));
    lines.push(format!(
        "Matching responses: {} ({:.2}%)",
        group_thousands(stats.matching_codes),
        pct_floor(stats.matching_pct)
    ));
    lines.push(format!(
        "Transport errors: {} ({:.2}%)",
        group_thousands(stats.error_count),
        pct_ceil(stats.error_pct)
    ));

    let mut error_types: Vec<(&String, &u64)> = stats.error_types.iter().collect();
    error_types.sort_by(|left, right| right.1.cmp(left.1).then_with(|| left.0.cmp(right.0)));
    for (label, count) in error_types {
        lines.push(format!("  {}: {}", label, group_thousands(*count)));
    }

    lines.push(format!(
        "Max open connections: {}",
        group_thousands(u64::try_from(report.max_open_conns).unwrap_or(u64::MAX))
    ));
    if !report.drained_cleanly {
        lines.push("Drain: gave up waiting for connections to close".to_owned());
    }
    lines.push(format!("Outcome: {}", report.outcome.as_str()));
    lines
}
