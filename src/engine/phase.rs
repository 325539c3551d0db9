use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

/// Lifecycle stage of a run. Ordered; a run only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TimerPhase {
    #[default]
    Bootstrap = 0,
    RampUp = 1,
    Main = 2,
    RampDown = 3,
    Draining = 4,
    Drained = 5,
    Done = 6,
}

impl TimerPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TimerPhase::Bootstrap => "bootstrap",
            TimerPhase::RampUp => "ramp-up",
            TimerPhase::Main => "main",
            TimerPhase::RampDown => "ramp-down",
            TimerPhase::Draining => "draining",
            TimerPhase::Drained => "drained",
            TimerPhase::Done => "done",
        }
    }

    #[must_use]
    pub const fn is_ramp(self) -> bool {
        matches!(self, TimerPhase::RampUp | TimerPhase::RampDown)
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => TimerPhase::Bootstrap,
            1 => TimerPhase::RampUp,
            2 => TimerPhase::Main,
            3 => TimerPhase::RampDown,
            4 => TimerPhase::Draining,
            5 => TimerPhase::Drained,
            _ => TimerPhase::Done,
        }
    }
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, monotonic holder of the current [`TimerPhase`].
///
/// Readers on hot paths use [`PhaseCell::get`]; tasks that react to
/// transitions use [`PhaseCell::subscribe`].
#[derive(Debug)]
pub struct PhaseCell {
    value: AtomicU8,
    notify: watch::Sender<TimerPhase>,
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseCell {
    #[must_use]
    pub fn new() -> Self {
        let (notify, _) = watch::channel(TimerPhase::Bootstrap);
        Self {
            value: AtomicU8::new(TimerPhase::Bootstrap as u8),
            notify,
        }
    }

    #[must_use]
    pub fn get(&self) -> TimerPhase {
        TimerPhase::from_u8(self.value.load(Ordering::Acquire))
    }

    /// Advances to `phase`. Returns `false` (and changes nothing) when the
    /// cell already holds `phase` or a later one.
    pub fn set(&self, phase: TimerPhase) -> bool {
        let previous = TimerPhase::from_u8(self.value.fetch_max(phase as u8, Ordering::AcqRel));
        if previous >= phase {
            return false;
        }
        info!("Phase {} -> {}", previous, phase);
        self.notify.send_if_modified(|current| {
            if *current < phase {
                *current = phase;
                true
            } else {
                false
            }
        });
        true
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimerPhase> {
        self.notify.subscribe()
    }
}
