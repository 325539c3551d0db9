use std::time::Duration;

use crate::args::ByteUnits;

const SI_LABELS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
const IEC_LABELS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

const NS_PER_US: f64 = 1_000.0;
const NS_PER_MS: f64 = 1_000_000.0;
const NS_PER_SEC: f64 = 1_000_000_000.0;

/// `1000000` -> `1.0MB` (SI) or `976.6KiB` (IEC). Values under one unit stay in bytes.
#[must_use]
pub fn format_bytes(bytes: u64, units: ByteUnits) -> String {
    let (base, labels) = match units {
        ByteUnits::Si => (1000.0_f64, SI_LABELS),
        ByteUnits::Iec => (1024.0_f64, IEC_LABELS),
    };
    let mut value = bytes as f64;
    if value < base {
        return format!("{}B", bytes);
    }
    let mut idx: usize = 0;
    while value >= base && idx.saturating_add(1) < labels.len() {
        value /= base;
        idx = idx.saturating_add(1);
    }
    let label = labels.get(idx).copied().unwrap_or("B");
    format!("{:.1}{}", value, label)
}

#[must_use]
pub fn format_rate_bytes(bytes_per_sec: u64, units: ByteUnits) -> String {
    format!("{}/s", format_bytes(bytes_per_sec, units))
}

/// `1234567` -> `1,234,567`.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let separators = digits.len().checked_div(3).unwrap_or(0);
    let mut grouped = String::with_capacity(digits.len().saturating_add(separators));
    for (idx, ch) in digits.chars().enumerate() {
        let remaining = digits.len().saturating_sub(idx);
        if idx > 0 && remaining.checked_rem(3) == Some(0) {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Rounds a percentage down to two decimals.
#[must_use]
pub fn pct_floor(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

/// Rounds a percentage up to two decimals.
#[must_use]
pub fn pct_ceil(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}

/// Picks ns, µs, ms, or s so the value stays readable.
#[must_use]
pub fn format_latency_ns(nanos: f64) -> String {
    if !nanos.is_finite() || nanos < NS_PER_US {
        return format!("{:.0}ns", nanos.max(0.0));
    }
    if nanos < NS_PER_MS {
        return format!("{:.2}µs", nanos / NS_PER_US);
    }
    if nanos < NS_PER_SEC {
        return format!("{:.2}ms", nanos / NS_PER_MS);
    }
    format!("{:.2}s", nanos / NS_PER_SEC)
}

#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn formats_si_and_iec_bytes() -> AppResult<()> {
        let cases = [
            (512, ByteUnits::Si, "512B"),
            (1_000_000, ByteUnits::Si, "1.0MB"),
            (1_000_000, ByteUnits::Iec, "976.6KiB"),
            (1_048_576, ByteUnits::Iec, "1.0MiB"),
            (1_500, ByteUnits::Si, "1.5kB"),
        ];
        for (bytes, units, expected) in cases {
            let formatted = format_bytes(bytes, units);
            if formatted != expected {
                return Err(AppError::validation(format!(
                    "{} bytes formatted as {} instead of {}",
                    bytes, formatted, expected
                )));
            }
        }
        Ok(())
    }

    #[test]
    fn groups_thousands() -> AppResult<()> {
        for (value, expected) in [(0, "0"), (999, "999"), (1_000, "1,000"), (1_234_567, "1,234,567")] {
            if group_thousands(value) != expected {
                return Err(AppError::validation(format!(
                    "{} grouped as {}",
                    value,
                    group_thousands(value)
                )));
            }
        }
        Ok(())
    }

    #[test]
    fn percentages_round_in_the_reported_direction() -> AppResult<()> {
        if format!("{:.2}", pct_floor(99.999)) != "99.99" {
            return Err(AppError::validation("Floor rounded up"));
        }
        if format!("{:.2}", pct_ceil(0.001)) != "0.01" {
            return Err(AppError::validation("Ceil rounded down"));
        }
        if format!("{:.2}", pct_floor(100.0)) != "100.00" {
            return Err(AppError::validation("Exact value changed"));
        }
        Ok(())
    }

    #[test]
    fn latency_picks_a_readable_unit() -> AppResult<()> {
        let cases = [
            (850.0, "850ns"),
            (12_500.0, "12.50µs"),
            (3_250_000.0, "3.25ms"),
            (1_500_000_000.0, "1.50s"),
        ];
        for (nanos, expected) in cases {
            if format_latency_ns(nanos) != expected {
                return Err(AppError::validation(format!(
                    "{} formatted as {}",
                    nanos,
                    format_latency_ns(nanos)
                )));
            }
        }
        Ok(())
    }
}
