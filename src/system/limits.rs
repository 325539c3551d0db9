use tracing::{info, warn};

use crate::args::MEMORY_PER_CONNECTION_BYTES;

/// What the host allows, as far as it could be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Soft `RLIMIT_NOFILE`.
    pub open_files: Option<u64>,
    pub total_memory_bytes: Option<u64>,
}

#[must_use]
pub fn detect_resource_limits() -> ResourceLimits {
    ResourceLimits {
        open_files: open_files_limit(),
        total_memory_bytes: total_memory_bytes(),
    }
}

/// Memory the run is expected to need for `concurrency` connections.
#[must_use]
pub fn predicted_memory_bytes(concurrency: usize) -> u64 {
    u64::try_from(concurrency)
        .unwrap_or(u64::MAX)
        .saturating_mul(MEMORY_PER_CONNECTION_BYTES)
}

/// Human-readable warnings for limits the run is likely to hit.
#[must_use]
pub fn resource_warnings(limits: &ResourceLimits, concurrency: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    let wanted = u64::try_from(concurrency).unwrap_or(u64::MAX);
    if let Some(open_files) = limits.open_files
        && open_files <= wanted
    {
        warnings.push(format!(
            "Open-file limit {} is not above concurrency {}; raise it with `ulimit -n`.",
            open_files, concurrency
        ));
    }
    let predicted = predicted_memory_bytes(concurrency);
    if let Some(total) = limits.total_memory_bytes
        && predicted > total
    {
        warnings.push(format!(
            "Predicted memory use of {} bytes exceeds the {} bytes installed.",
            predicted, total
        ));
    }
    warnings
}

/// Logs the detected limits and any warning. Never fails the run.
pub fn log_resource_report(limits: &ResourceLimits, concurrency: usize) {
    match limits.open_files {
        Some(value) => info!("Open-file limit: {}", value),
        None => info!("Open-file limit: unable to detect"),
    }
    match limits.total_memory_bytes {
        Some(value) => info!(
            "Installed memory: {} bytes (run needs ~{} bytes)",
            value,
            predicted_memory_bytes(concurrency)
        ),
        None => info!("Installed memory: unable to detect"),
    }
    for warning in resource_warnings(limits, concurrency) {
        warn!("{}", warning);
    }
}

#[cfg(unix)]
fn open_files_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // Safety: getrlimit only writes into the rlimit we pass by pointer.
    let status = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if status != 0 {
        return None;
    }
    u64::try_from(limit.rlim_cur).ok()
}

#[cfg(not(unix))]
fn open_files_limit() -> Option<u64> {
    None
}

#[cfg(unix)]
fn total_memory_bytes() -> Option<u64> {
    // Safety: sysconf has no preconditions; we only read two constants.
    let (pages, page_size) = unsafe {
        (
            libc::sysconf(libc::_SC_PHYS_PAGES),
            libc::sysconf(libc::_SC_PAGESIZE),
        )
    };
    if pages <= 0 || page_size <= 0 {
        return None;
    }
    let pages = u64::try_from(pages).ok()?;
    let page_size = u64::try_from(page_size).ok()?;
    Some(pages.saturating_mul(page_size))
}

#[cfg(not(unix))]
fn total_memory_bytes() -> Option<u64> {
    None
}
