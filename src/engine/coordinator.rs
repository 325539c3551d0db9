use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::ExecutorProvider;
use crate::metrics::{ReqAttempt, ReqStats, StatsAggregator};
use crate::shutdown::ShutdownReceiver;
use crate::sinks::AttemptLog;

use super::controller::PhaseController;
use super::marks::{ChunkMark, ProgressMarks};
use super::phase::{PhaseCell, TimerPhase};
use super::probe::ConnectionMonitor;
use super::run::LoadPlan;

pub const TELEMETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Stop signals during the drain go out almost at once.
const DRAIN_STOP_STAGGER: Duration = Duration::from_millis(1);

/// Bound on how long the drain waits for workers and connections to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    pub polls: u32,
    pub interval: Duration,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            polls: 300,
            interval: Duration::from_millis(100),
        }
    }
}

impl DrainPolicy {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_mul(self.polls)
    }
}

/// Latest view pushed to renderers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Telemetry {
    pub phase: TimerPhase,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub open_conns: usize,
    pub max_open_conns: usize,
    pub marks: Vec<ChunkMark>,
    pub stats: ReqStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Clean,
    Degraded,
    Interrupted,
}

impl RunOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Clean => "clean",
            RunOutcome::Degraded => "degraded (transport errors)",
            RunOutcome::Interrupted => "interrupted",
        }
    }
}

/// Final result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub phase: TimerPhase,
    pub interrupted: bool,
    /// False when the drain bound ran out before workers and connections finished.
    pub drained_cleanly: bool,
    pub max_open_conns: usize,
    pub outcome: RunOutcome,
    pub stats: ReqStats,
}

/// Everything the coordinator owns for the lifetime of a run.
#[derive(Debug)]
pub struct CoordinatorParts {
    pub plan: LoadPlan,
    pub phase: Arc<PhaseCell>,
    pub controller: PhaseController,
    pub aggregator: StatsAggregator,
    pub results_rx: mpsc::Receiver<ReqAttempt>,
    pub monitor: ConnectionMonitor,
    pub monitor_stop: CancellationToken,
    pub marks: Arc<ProgressMarks>,
    pub interrupts: ShutdownReceiver,
    pub collaborators: CancellationToken,
    pub telemetry_tx: Option<watch::Sender<Telemetry>>,
    pub attempt_log: Option<AttemptLog>,
    pub provider: Option<ExecutorProvider>,
    pub drain: DrainPolicy,
    pub started: Instant,
}

/// Top-level control loop: consumes attempts, fires the ramp-down and
/// deadline timers, reacts to interrupts, and drains.
#[derive(Debug)]
pub struct DrainCoordinator {
    parts: CoordinatorParts,
}

impl DrainCoordinator {
    #[must_use]
    pub const fn new(parts: CoordinatorParts) -> Self {
        Self { parts }
    }

    pub async fn run(mut self) -> RunReport {
        let interrupted = self.run_main_loop().await;
        let drained_cleanly = self.drain(interrupted).await;
        self.finish(interrupted, drained_cleanly)
    }

    async fn run_main_loop(&mut self) -> bool {
        let plan = self.parts.plan.clone();
        let started = self.parts.started;
        let mut phase_rx = self.parts.phase.subscribe();
        let deadline = sleep_until(started + plan.duration);
        let ramp_down = sleep_until(started + plan.duration.saturating_sub(plan.ramp));
        tokio::pin!(deadline);
        tokio::pin!(ramp_down);
        let mut ramp_down_pending = !plan.ramp.is_zero();
        let mut interrupts_open = true;
        let mut ramp_down_task: Option<JoinHandle<()>> = None;
        let mut telemetry_tick = tokio::time::interval(TELEMETRY_INTERVAL);

        let interrupted = loop {
            tokio::select! {
                received = self.parts.interrupts.recv(), if interrupts_open => match received {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        info!("Interrupt received at {:?}", started.elapsed());
                        break true;
                    }
                    Err(RecvError::Closed) => interrupts_open = false,
                },
                () = &mut deadline => break false,
                () = &mut ramp_down, if ramp_down_pending => {
                    ramp_down_pending = false;
                    self.parts.phase.set(TimerPhase::RampDown);
                    let stagger = self.parts.controller.stagger();
                    ramp_down_task = Some(self.parts.controller.stop_workers(stagger));
                }
                attempt = self.parts.results_rx.recv() => match attempt {
                    Some(attempt) => self.consume(attempt),
                    None => {
                        debug!("All workers exited before the deadline");
                        break false;
                    }
                },
                _ = telemetry_tick.tick() => self.publish(),
                changed = phase_rx.changed() => {
                    if changed.is_ok() {
                        self.publish();
                    }
                }
            }
        };

        if let Some(task) = ramp_down_task {
            task.abort();
        }
        interrupted
    }

    /// Stops everything and waits, within the drain bound, for workers to exit
    /// and connections to close. Returns whether that happened in time.
    async fn drain(&mut self, interrupted: bool) -> bool {
        self.parts.phase.set(TimerPhase::Draining);
        self.publish();
        if interrupted {
            self.parts.collaborators.cancel();
        }

        let stopper = self.parts.controller.stop_workers(DRAIN_STOP_STAGGER);
        let workers = self.parts.controller.finish_launch().await;
        drop(self.parts.provider.take());

        let drain_deadline = Instant::now() + self.parts.drain.timeout();
        let mut drained = false;
        let mut results_open = true;
        loop {
            self.consume_ready();
            let workers_done = workers.iter().all(JoinHandle::is_finished);
            if workers_done && self.parts.monitor.latest() == 0 {
                drained = true;
                break;
            }
            if Instant::now() >= drain_deadline {
                break;
            }
            if !results_open {
                sleep(self.parts.drain.interval).await;
                continue;
            }
            tokio::select! {
                attempt = self.parts.results_rx.recv() => match attempt {
                    Some(attempt) => self.consume(attempt),
                    None => results_open = false,
                },
                () = sleep(self.parts.drain.interval) => {}
            }
        }

        if !drained {
            let stuck = workers.iter().filter(|handle| !handle.is_finished()).count();
            warn!(
                "Drain bound of {:?} reached with {} workers running and {} connections open",
                self.parts.drain.timeout(),
                stuck,
                self.parts.monitor.latest()
            );
            for handle in &workers {
                handle.abort();
            }
        }
        stopper.abort();
        self.parts.phase.set(TimerPhase::Drained);
        self.consume_ready();
        self.publish();
        drained
    }

    fn finish(mut self, interrupted: bool, drained_cleanly: bool) -> RunReport {
        self.parts.phase.set(TimerPhase::Done);
        self.parts.monitor_stop.cancel();
        self.parts.results_rx.close();
        self.consume_ready();

        let stats = self.parts.aggregator.finalize();
        let outcome = if interrupted {
            RunOutcome::Interrupted
        } else if stats.error_count > 0 {
            RunOutcome::Degraded
        } else {
            RunOutcome::Clean
        };
        self.publish_stats(stats.clone());

        RunReport {
            started_at: self.parts.aggregator.started_at(),
            stopped_at: Utc::now(),
            phase: self.parts.phase.get(),
            interrupted,
            drained_cleanly,
            max_open_conns: self.parts.monitor.max(),
            outcome,
            stats,
        }
    }

    fn consume(&mut self, attempt: ReqAttempt) {
        self.parts.aggregator.update(&attempt, Utc::now());
        if let Some(log) = self.parts.attempt_log.as_ref() {
            log.offer(attempt);
        }
    }

    fn consume_ready(&mut self) {
        while let Ok(attempt) = self.parts.results_rx.try_recv() {
            self.consume(attempt);
        }
    }

    fn publish(&self) {
        self.publish_stats(self.parts.aggregator.snapshot());
    }

    fn publish_stats(&self, stats: ReqStats) {
        let Some(telemetry_tx) = self.parts.telemetry_tx.as_ref() else {
            return;
        };
        telemetry_tx.send_replace(Telemetry {
            phase: self.parts.phase.get(),
            elapsed: self.parts.started.elapsed(),
            open_conns: self.parts.monitor.latest(),
            max_open_conns: self.parts.monitor.max(),
            marks: self.parts.marks.snapshot(),
            stats,
        });
    }
}

fn serialize_millis<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}
