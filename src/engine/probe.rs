use std::collections::HashSet;
use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Host;

use crate::error::{AppError, AppResult, HttpError};

pub const MONITOR_INTERVAL: Duration = Duration::from_millis(100);

const TCP_ESTABLISHED: &str = "01";
const PROC_NET_TABLES: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];
const PROC_SELF_FD: &str = "/proc/self/fd";

/// Pollable count of established connections from this process to the target.
///
/// Implementations must not fail: an unreadable source reports zero.
pub trait ConnectionProbe: Debug + Send + Sync {
    fn open_connections(&self) -> usize;
}

/// Probe for platforms without a connection table; always reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl ConnectionProbe for NullProbe {
    fn open_connections(&self) -> usize {
        0
    }
}

/// Linux probe joining this process's socket inodes with `/proc/net/tcp{,6}`.
#[derive(Debug, Clone)]
pub struct ProcNetProbe {
    targets: Vec<SocketAddr>,
}

impl ProcNetProbe {
    #[must_use]
    pub fn new(targets: Vec<SocketAddr>) -> Self {
        Self {
            targets: targets.into_iter().map(normalize_addr).collect(),
        }
    }

    /// Resolves the URL's host to every address a connection could land on.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL has no host or the host cannot be resolved.
    pub async fn resolve(url: &Url) -> AppResult<Self> {
        let port = url.port_or_known_default().unwrap_or(80);
        let targets = match url.host() {
            Some(Host::Ipv4(addr)) => vec![SocketAddr::new(IpAddr::V4(addr), port)],
            Some(Host::Ipv6(addr)) => vec![SocketAddr::new(IpAddr::V6(addr), port)],
            Some(Host::Domain(domain)) => tokio::net::lookup_host((domain, port))
                .await
                .map_err(|err| {
                    AppError::http(HttpError::ResolveHost {
                        host: domain.to_owned(),
                        port,
                        source: err,
                    })
                })?
                .collect(),
            None => {
                return Err(AppError::http(HttpError::ResolveHost {
                    host: String::new(),
                    port,
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing host"),
                }));
            }
        };
        Ok(Self::new(targets))
    }

    fn count(&self) -> std::io::Result<usize> {
        let inodes = socket_inodes()?;
        let mut total: usize = 0;
        for table in PROC_NET_TABLES {
            let content = match std::fs::read_to_string(table) {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            total = total.saturating_add(
                content
                    .lines()
                    .skip(1)
                    .filter_map(parse_proc_net_line)
                    .filter(|entry| {
                        entry.established
                            && inodes.contains(&entry.inode)
                            && self.targets.contains(&entry.remote)
                    })
                    .count(),
            );
        }
        Ok(total)
    }
}

impl ConnectionProbe for ProcNetProbe {
    fn open_connections(&self) -> usize {
        match self.count() {
            Ok(count) => count,
            Err(err) => {
                debug!("Connection probe read failed: {}", err);
                0
            }
        }
    }
}

/// Picks the best probe available on this platform for `url`.
pub async fn default_probe(url: &Url) -> Arc<dyn ConnectionProbe> {
    if !cfg!(target_os = "linux") {
        debug!("No connection table on this platform; open connections not detected.");
        return Arc::new(NullProbe);
    }
    match ProcNetProbe::resolve(url).await {
        Ok(probe) => Arc::new(probe),
        Err(err) => {
            warn!("Open-connection probe disabled: {}", err);
            Arc::new(NullProbe)
        }
    }
}

/// One row of `/proc/net/tcp` or `/proc/net/tcp6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProcNetEntry {
    pub(crate) remote: SocketAddr,
    pub(crate) established: bool,
    pub(crate) inode: u64,
}

pub(crate) fn parse_proc_net_line(line: &str) -> Option<ProcNetEntry> {
    let mut fields = line.split_whitespace();
    let _slot = fields.next()?;
    let _local = fields.next()?;
    let remote = parse_hex_endpoint(fields.next()?)?;
    let state = fields.next()?;
    let inode = fields.nth(5)?.parse::<u64>().ok()?;
    Some(ProcNetEntry {
        remote: normalize_addr(remote),
        established: state == TCP_ESTABLISHED,
        inode,
    })
}

/// Kernel prints each 32-bit address word in host byte order; the port is plain hex.
fn parse_hex_endpoint(raw: &str) -> Option<SocketAddr> {
    let (addr, port) = raw.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let ip = match addr.len() {
        8 => {
            let word = u32::from_str_radix(addr, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0_u8; 16];
            for (idx, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let start = idx.checked_mul(8)?;
                let word = u32::from_str_radix(addr.get(start..start.checked_add(8)?)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}

fn normalize_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, |v4| {
            SocketAddr::new(IpAddr::V4(v4), addr.port())
        }),
        IpAddr::V4(_) => addr,
    }
}

fn socket_inodes() -> std::io::Result<HashSet<u64>> {
    let mut inodes = HashSet::new();
    for entry in std::fs::read_dir(PROC_SELF_FD)? {
        let Ok(entry) = entry else { continue };
        let Ok(target) = std::fs::read_link(entry.path()) else {
            continue;
        };
        let target = target.to_string_lossy();
        if let Some(inode) = target
            .strip_prefix("socket:[")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|inode| inode.parse::<u64>().ok())
        {
            inodes.insert(inode);
        }
    }
    Ok(inodes)
}

/// Background poller keeping the latest and peak open-connection counts.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMonitor {
    latest: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl ConnectionMonitor {
    /// Polls `probe` every `interval` on the blocking pool until `stop` fires.
    #[must_use]
    pub fn spawn(
        probe: Arc<dyn ConnectionProbe>,
        interval: Duration,
        stop: CancellationToken,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let monitor = Self::default();
        let task_monitor = monitor.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let probe = Arc::clone(&probe);
                        match tokio::task::spawn_blocking(move || probe.open_connections()).await {
                            Ok(count) => task_monitor.observe(count),
                            Err(err) => debug!("Connection probe task failed: {}", err),
                        }
                    }
                }
            }
        });
        (monitor, handle)
    }

    pub(crate) fn observe(&self, count: usize) {
        self.latest.store(count, Ordering::Release);
        self.max.fetch_max(count, Ordering::AcqRel);
    }

    #[must_use]
    pub fn latest(&self) -> usize {
        self.latest.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max(&self) -> usize {
        self.max.load(Ordering::Acquire)
    }
}
