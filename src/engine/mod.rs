//! Run lifecycle: phases, worker launch and stop, connection monitoring, and the drain.
mod controller;
mod coordinator;
mod marks;
mod phase;
mod probe;
mod run;

#[cfg(test)]
mod tests;

pub use controller::{PhaseController, STOP_SIGNAL_CAPACITY, stagger};
pub use coordinator::{
    CoordinatorParts, DrainCoordinator, DrainPolicy, RunOutcome, RunReport, TELEMETRY_INTERVAL,
    Telemetry,
};
pub use marks::{ChunkMark, DEFAULT_PROGRESS_CHUNKS, ProgressMarks};
pub use phase::{PhaseCell, TimerPhase};
pub use probe::{
    ConnectionMonitor, ConnectionProbe, MONITOR_INTERVAL, NullProbe, ProcNetProbe, default_probe,
};
pub use run::{LoadInputs, LoadPlan, run_load};
