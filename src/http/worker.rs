use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::engine::{PhaseCell, ProgressMarks};
use crate::metrics::ReqAttempt;

use super::classify::classify_transport_error;
use super::executor::{Exchange, HttpExecutor};
use super::template::RequestTemplate;
use super::wire::request_wire_size;

/// Everything one worker needs, handed over at launch.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub id: usize,
    pub template: Arc<RequestTemplate>,
    /// Request builder only; requests go out through `executor`.
    pub request_client: Client,
    pub executor: Arc<dyn HttpExecutor>,
    pub spacing: Option<Duration>,
    pub results_tx: mpsc::Sender<ReqAttempt>,
    pub phase: Arc<PhaseCell>,
    pub marks: Arc<ProgressMarks>,
}

/// Issues requests back to back until told to stop.
///
/// The stop signal is checked between attempts: an in-flight request is
/// always allowed to finish and its attempt is still emitted.
#[derive(Debug)]
pub struct RequestWorker {
    context: WorkerContext,
    stop_rx: mpsc::Receiver<()>,
}

impl RequestWorker {
    #[must_use]
    pub const fn new(context: WorkerContext, stop_rx: mpsc::Receiver<()>) -> Self {
        Self { context, stop_rx }
    }

    /// Runs the request loop and returns how many attempts were emitted.
    pub async fn run(mut self) -> u64 {
        let mut emitted: u64 = 0;
        loop {
            if self.stop_requested() {
                break;
            }
            if let Some(spacing) = self.context.spacing {
                tokio::select! {
                    _ = self.stop_rx.recv() => break,
                    () = sleep(spacing) => {}
                }
            }

            let attempt = self.attempt_once().await;
            if self.context.results_tx.send(attempt).await.is_err() {
                debug!("Worker {} lost its result channel", self.context.id);
                break;
            }
            emitted = emitted.saturating_add(1);
        }
        debug!("Worker {} stopped after {} attempts", self.context.id, emitted);
        emitted
    }

    fn stop_requested(&mut self) -> bool {
        match self.stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    async fn attempt_once(&self) -> ReqAttempt {
        let ctx = &self.context;
        let start = Utc::now();
        let started = Instant::now();
        if ctx.phase.get().is_ramp() {
            ctx.marks.mark_ramp(started);
        }

        let (exchange, req_bytes) = match ctx.template.materialize(&ctx.request_client) {
            Ok(request) => {
                let req_bytes = request_wire_size(&request);
                (ctx.executor.execute(request).await, req_bytes)
            }
            Err(err) => (Exchange::failed(err.to_string()), 0),
        };

        let elapsed = started.elapsed();
        let stop = Utc::now();
        let res_err = exchange
            .error
            .as_deref()
            .map(classify_transport_error)
            .unwrap_or_default();
        if !res_err.is_empty() {
            ctx.marks.mark_error(Instant::now());
        }

        ReqAttempt {
            start,
            stop,
            elapsed,
            req_bytes,
            res_bytes: exchange.response_bytes,
            res_code: exchange.status.unwrap_or(0),
            res_err,
        }
    }
}
