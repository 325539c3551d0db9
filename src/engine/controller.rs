use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::http::{RequestWorker, WorkerContext};

use super::phase::{PhaseCell, TimerPhase};
use super::probe::ConnectionMonitor;

/// Each stop channel holds an early cancel and a deadline stop without blocking.
pub const STOP_SIGNAL_CAPACITY: usize = 2;
/// How often the launcher checks whether the target concurrency is connected.
const RAMP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Delay between consecutive worker launches (and stops): `ramp / concurrency`.
#[must_use]
pub fn stagger(ramp: Duration, concurrency: usize) -> Duration {
    let workers = u32::try_from(concurrency).unwrap_or(u32::MAX);
    ramp.checked_div(workers).unwrap_or(Duration::ZERO)
}

/// Starts and stops workers progressively and advances the ramp phases.
#[derive(Debug)]
pub struct PhaseController {
    phase: Arc<PhaseCell>,
    concurrency: usize,
    stagger: Duration,
    stop_txs: Arc<[mpsc::Sender<()>]>,
    launcher: Option<JoinHandle<Vec<JoinHandle<u64>>>>,
    launch_cancel: CancellationToken,
}

impl PhaseController {
    #[must_use]
    pub fn new(phase: Arc<PhaseCell>, ramp: Duration, concurrency: usize) -> Self {
        Self {
            phase,
            concurrency,
            stagger: stagger(ramp, concurrency),
            stop_txs: Arc::from(Vec::new()),
            launcher: None,
            launch_cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Enters RampUp and launches one worker per context, `stagger` apart.
    ///
    /// Once every worker is running the launcher waits for the monitor to see
    /// the full concurrency connected and then enters Main. If that never
    /// happens the run stays in RampUp, which is reported but not fatal.
    pub fn ramp_up(&mut self, contexts: Vec<WorkerContext>, monitor: ConnectionMonitor) {
        let mut stop_txs = Vec::with_capacity(contexts.len());
        let mut workers = Vec::with_capacity(contexts.len());
        for context in contexts {
            let (stop_tx, stop_rx) = mpsc::channel::<()>(STOP_SIGNAL_CAPACITY);
            stop_txs.push(stop_tx);
            workers.push(RequestWorker::new(context, stop_rx));
        }
        self.stop_txs = Arc::from(stop_txs);

        self.phase.set(TimerPhase::RampUp);
        let phase = Arc::clone(&self.phase);
        let cancel = self.launch_cancel.clone();
        let stagger = self.stagger;
        let target = self.concurrency;

        self.launcher = Some(tokio::spawn(async move {
            let mut handles = Vec::with_capacity(workers.len());
            for (idx, worker) in workers.into_iter().enumerate() {
                if idx > 0 && !stagger.is_zero() {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = sleep(stagger) => {}
                    }
                }
                if cancel.is_cancelled() {
                    break;
                }
                handles.push(tokio::spawn(worker.run()));
            }
            debug!("Launched {} of {} workers", handles.len(), target);

            loop {
                if monitor.latest() >= target {
                    phase.set(TimerPhase::Main);
                    break;
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = sleep(RAMP_POLL_INTERVAL) => {}
                }
            }
            handles
        }));
    }

    /// Sends a stop signal to every worker, `delay` apart, on a background task.
    pub fn stop_workers(&self, delay: Duration) -> JoinHandle<()> {
        let stop_txs = Arc::clone(&self.stop_txs);
        info!(
            "Stopping {} workers {:?} apart",
            stop_txs.len(),
            delay
        );
        tokio::spawn(async move {
            for (idx, stop_tx) in stop_txs.iter().enumerate() {
                if idx > 0 && !delay.is_zero() {
                    sleep(delay).await;
                }
                drop(stop_tx.try_send(()));
            }
        })
    }

    /// Stops launching and returns the handles of every worker started so far.
    pub async fn finish_launch(&mut self) -> Vec<JoinHandle<u64>> {
        self.launch_cancel.cancel();
        match self.launcher.take() {
            Some(launcher) => match launcher.await {
                Ok(handles) => handles,
                Err(err) => {
                    debug!("Worker launcher ended abnormally: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }
}
