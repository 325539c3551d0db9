//! Attempt records and the streaming statistics built from them.
mod aggregator;
mod histogram;
mod types;
mod welford;
mod window;


pub use aggregator::StatsAggregator;
pub use histogram::{DEFAULT_SIGFIG, LatencyHistogram};
pub use types::{LatencyQuantiles, LatencySummary, Rate, ReqAttempt, ReqStats};
pub use welford::OnlineVariance;
pub use window::{DecayingCounter, RATE_WINDOW};
