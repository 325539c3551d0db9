use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::http::{ExecutorProvider, RequestTemplate, WorkerContext};
use crate::metrics::{ReqAttempt, StatsAggregator};
use crate::shutdown::ShutdownReceiver;
use crate::sinks::AttemptLog;

use super::controller::PhaseController;
use super::coordinator::{CoordinatorParts, DrainCoordinator, DrainPolicy, RunReport, Telemetry};
use super::marks::{DEFAULT_PROGRESS_CHUNKS, ProgressMarks};
use super::phase::PhaseCell;
use super::probe::{ConnectionMonitor, ConnectionProbe, MONITOR_INTERVAL};

/// Attempts buffered between workers and the coordinator.
const RESULTS_CHANNEL_CAPACITY: usize = 65_535;

/// Shape of the load: how many workers, for how long, and what counts as a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub concurrency: usize,
    pub duration: Duration,
    pub ramp: Duration,
    /// Pause before every request of a worker.
    pub spacing: Option<Duration>,
    pub target_status: u16,
}

/// Collaborators and settings for one [`run_load`] call.
#[derive(Debug)]
pub struct LoadInputs {
    pub plan: LoadPlan,
    pub template: Arc<RequestTemplate>,
    pub provider: ExecutorProvider,
    pub request_client: Client,
    pub probe: Arc<dyn ConnectionProbe>,
    /// Interrupts (signals, sink failures) arrive here. Subscribe before any
    /// setup work so an interrupt sent in the meantime is still delivered.
    pub interrupts: ShutdownReceiver,
    /// Cancelled on interrupt so side tasks (preflight, renderers) stop early.
    pub collaborators: CancellationToken,
    pub telemetry_tx: Option<watch::Sender<Telemetry>>,
    pub attempt_log: Option<AttemptLog>,
    pub drain: DrainPolicy,
}

/// Runs one load from bootstrap to done and returns the final report.
///
/// # Errors
///
/// Returns an error when the aggregator cannot be created or a worker cannot
/// be given an executor. Once workers start, problems end up in the report
/// instead.
pub async fn run_load(inputs: LoadInputs) -> AppResult<RunReport> {
    let LoadInputs {
        plan,
        template,
        provider,
        request_client,
        probe,
        interrupts,
        collaborators,
        telemetry_tx,
        attempt_log,
        drain,
    } = inputs;

    let started = Instant::now();
    let started_at = Utc::now();
    let phase = Arc::new(PhaseCell::new());
    let marks = Arc::new(ProgressMarks::new(
        started,
        plan.duration,
        DEFAULT_PROGRESS_CHUNKS,
    ));
    let aggregator = StatsAggregator::new(started_at, plan.target_status)?;
    let (results_tx, results_rx) = mpsc::channel::<ReqAttempt>(RESULTS_CHANNEL_CAPACITY);

    let mut contexts = Vec::with_capacity(plan.concurrency);
    for id in 0..plan.concurrency {
        contexts.push(WorkerContext {
            id,
            template: Arc::clone(&template),
            request_client: request_client.clone(),
            executor: provider.for_worker(id)?,
            spacing: plan.spacing,
            results_tx: results_tx.clone(),
            phase: Arc::clone(&phase),
            marks: Arc::clone(&marks),
        });
    }
    drop(results_tx);

    let monitor_stop = CancellationToken::new();
    let (monitor, monitor_task) =
        ConnectionMonitor::spawn(probe, MONITOR_INTERVAL, monitor_stop.clone());

    info!(
        "Starting {} workers for {:?} (ramp {:?})",
        plan.concurrency, plan.duration, plan.ramp
    );
    let mut controller = PhaseController::new(Arc::clone(&phase), plan.ramp, plan.concurrency);
    controller.ramp_up(contexts, monitor.clone());

    let coordinator = DrainCoordinator::new(CoordinatorParts {
        plan,
        phase,
        controller,
        aggregator,
        results_rx,
        monitor,
        monitor_stop,
        marks,
        interrupts,
        collaborators,
        telemetry_tx,
        attempt_log,
        provider: Some(provider),
        drain,
        started,
    });
    let report = coordinator.run().await;

    if let Err(err) = monitor_task.await {
        debug!("Connection monitor ended abnormally: {}", err);
    }
    Ok(report)
}
