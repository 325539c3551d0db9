use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;

/// Width of the sliding window behind the "current per second" rates.
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct CounterState {
    current: AtomicI64,
    max: AtomicI64,
}

/// Approximate per-second rate without a sample history.
///
/// Every [`DecayingCounter::record`] adds to the counter and schedules the
/// matching subtraction one window later. The scheduled task only touches the
/// atomic and is never cancelled; if the runtime is gone the value is simply
/// not decremented.
#[derive(Debug, Clone, Default)]
pub struct DecayingCounter {
    state: Arc<CounterState>,
}

impl DecayingCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, amount: u64) {
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        if amount == 0 {
            return;
        }
        let current = self
            .state
            .current
            .fetch_add(amount, Ordering::AcqRel)
            .saturating_add(amount);
        self.state.max.fetch_max(current, Ordering::AcqRel);

        let state = Arc::clone(&self.state);
        match Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn(async move {
                    tokio::time::sleep(RATE_WINDOW).await;
                    state.current.fetch_sub(amount, Ordering::AcqRel);
                }));
            }
            Err(_) => {
                state.current.fetch_sub(amount, Ordering::AcqRel);
            }
        }
    }

    /// Amount recorded during the last window.
    #[must_use]
    pub fn current(&self) -> u64 {
        u64::try_from(self.state.current.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Highest windowed amount observed so far.
    #[must_use]
    pub fn max(&self) -> u64 {
        u64::try_from(self.state.max.load(Ordering::Acquire)).unwrap_or(0)
    }
}
