use super::*;
use crate::args::HttpMethod;
use crate::error::{AppError, AppResult, HttpError};
use crate::http::{
    Exchange, ExecutorProvider, HttpExecutor, RequestTemplate, RequestWorker, TemplateBody,
    WorkerContext,
};
use crate::metrics::ReqAttempt;
use crate::shutdown::{ShutdownSender, shutdown_channel};
use async_trait::async_trait;
use reqwest::{Client, Request, Url};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const TARGET: &str = "http://127.0.0.1:9/health";

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::http(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

#[derive(Debug, Clone, Copy)]
enum StubReply {
    Ok,
    Refused,
}

#[derive(Debug)]
struct StubExecutor {
    reply: StubReply,
}

#[async_trait]
impl HttpExecutor for StubExecutor {
    async fn execute(&self, _request: Request) -> Exchange {
        tokio::time::sleep(Duration::from_millis(2)).await;
        match self.reply {
            StubReply::Ok => Exchange {
                status: Some(200),
                response_bytes: 64,
                error: None,
            },
            StubReply::Refused => Exchange::failed(
                "error sending request for url (http://127.0.0.1:9/health): client error (Connect): tcp connect error: Connection refused (os error 111)",
            ),
        }
    }
}

#[derive(Debug)]
struct FixedProbe(usize);

impl ConnectionProbe for FixedProbe {
    fn open_connections(&self) -> usize {
        self.0
    }
}

fn template() -> AppResult<Arc<RequestTemplate>> {
    let url = Url::parse(TARGET).map_err(|err| {
        AppError::http(HttpError::InvalidUrl {
            url: TARGET.to_owned(),
            source: err,
        })
    })?;
    Ok(Arc::new(RequestTemplate::new(
        HttpMethod::Get,
        url,
        &[],
        None,
        TemplateBody::Empty,
    )?))
}

fn plan(concurrency: usize, duration_ms: u64, ramp_ms: u64) -> LoadPlan {
    LoadPlan {
        concurrency,
        duration: Duration::from_millis(duration_ms),
        ramp: Duration::from_millis(ramp_ms),
        spacing: None,
        target_status: 200,
    }
}

fn inputs(
    plan: LoadPlan,
    reply: StubReply,
    probe: Arc<dyn ConnectionProbe>,
) -> AppResult<(LoadInputs, ShutdownSender, watch::Receiver<Telemetry>)> {
    let (shutdown_tx, interrupts) = shutdown_channel();
    let (telemetry_tx, telemetry_rx) = watch::channel(Telemetry::default());
    let executor: Arc<dyn HttpExecutor> = Arc::new(StubExecutor { reply });
    Ok((
        LoadInputs {
            plan,
            template: template()?,
            provider: ExecutorProvider::shared(executor),
            request_client: Client::new(),
            probe,
            interrupts,
            collaborators: CancellationToken::new(),
            telemetry_tx: Some(telemetry_tx),
            attempt_log: None,
            drain: DrainPolicy {
                polls: 5,
                interval: Duration::from_millis(20),
            },
        },
        shutdown_tx,
        telemetry_rx,
    ))
}

/// Records each distinct phase published on `telemetry_rx` with its elapsed time.
fn watch_phases(
    mut telemetry_rx: watch::Receiver<Telemetry>,
) -> tokio::task::JoinHandle<Vec<(TimerPhase, Duration)>> {
    tokio::spawn(async move {
        let mut seen: Vec<(TimerPhase, Duration)> = Vec::new();
        while telemetry_rx.changed().await.is_ok() {
            let (phase, elapsed) = {
                let telemetry = telemetry_rx.borrow_and_update();
                (telemetry.phase, telemetry.elapsed)
            };
            if seen.last().is_none_or(|(last, _)| *last != phase) {
                seen.push((phase, elapsed));
            }
        }
        seen
    })
}

fn phase_order(seen: &[(TimerPhase, Duration)]) -> Vec<TimerPhase> {
    seen.iter().map(|(phase, _)| *phase).collect()
}

#[test]
fn stagger_divides_ramp_by_concurrency() -> AppResult<()> {
    if stagger(Duration::from_secs(12), 3) != Duration::from_secs(4) {
        return Err(AppError::http("12s over 3 workers should be 4s apart"));
    }
    if stagger(Duration::from_secs(60), 2048) != Duration::from_nanos(29_296_875) {
        return Err(AppError::http("60s over 2048 workers mismatched"));
    }
    if stagger(Duration::ZERO, 8) != Duration::ZERO {
        return Err(AppError::http("Zero ramp should launch at once"));
    }
    Ok(())
}

#[test]
fn phase_never_moves_backwards() -> AppResult<()> {
    let cell = PhaseCell::new();
    if cell.get() != TimerPhase::Bootstrap {
        return Err(AppError::http("Cell should start in bootstrap"));
    }
    if !cell.set(TimerPhase::Main) {
        return Err(AppError::http("Forward transition was rejected"));
    }
    if cell.set(TimerPhase::RampUp) {
        return Err(AppError::http("Backward transition was accepted"));
    }
    if cell.set(TimerPhase::Main) {
        return Err(AppError::http("Repeated transition reported a change"));
    }
    if cell.get() != TimerPhase::Main {
        return Err(AppError::http(format!("Unexpected phase {}", cell.get())));
    }
    Ok(())
}

#[test]
fn phase_subscribers_see_transitions() -> AppResult<()> {
    run_async_test(async {
        let cell = PhaseCell::new();
        let mut rx = cell.subscribe();
        cell.set(TimerPhase::RampUp);
        rx.changed()
            .await
            .map_err(|err| AppError::http(format!("Watch closed: {}", err)))?;
        if *rx.borrow() != TimerPhase::RampUp {
            return Err(AppError::http("Subscriber missed the ramp-up"));
        }
        Ok(())
    })
}

#[test]
fn chunk_index_is_clamped_to_last_chunk() -> AppResult<()> {
    let marks = ProgressMarks::new(Instant::now(), Duration::from_secs(30), 30);
    let cases = [
        (Duration::ZERO, 0_usize),
        (Duration::from_millis(1_500), 1),
        (Duration::from_millis(29_900), 29),
        (Duration::from_secs(45), 29),
    ];
    for (elapsed, expected) in cases {
        let index = marks.chunk_index_for(elapsed);
        if index != expected {
            return Err(AppError::http(format!(
                "{:?} mapped to chunk {} instead of {}",
                elapsed, index, expected
            )));
        }
    }
    Ok(())
}

#[test]
fn marks_record_ramp_and_error_chunks() -> AppResult<()> {
    let started = Instant::now();
    let marks = ProgressMarks::new(started, Duration::from_secs(10), 10);
    marks.mark_ramp(started);
    marks.mark_error(started + Duration::from_millis(9_500));
    let snapshot = marks.snapshot();
    if snapshot.len() != 10 {
        return Err(AppError::http("Snapshot size mismatch"));
    }
    let first = snapshot.first().copied().unwrap_or_default();
    let last = snapshot.last().copied().unwrap_or_default();
    if !first.ramp || first.error {
        return Err(AppError::http("First chunk should only be ramp"));
    }
    if !last.error || last.ramp {
        return Err(AppError::http("Last chunk should only be error"));
    }
    if snapshot.iter().filter(|mark| mark.ramp || mark.error).count() != 2 {
        return Err(AppError::http("Unexpected marked chunks"));
    }
    Ok(())
}

#[test]
fn parses_proc_net_tcp_rows() -> AppResult<()> {
    let row = "   3: 0100007F:A2C4 0100007F:1F90 01 00000000:00000000 00:00000000 00000000  1000        0 48213 1 0000000000000000 20 4 30 10 -1";
    let entry = probe::parse_proc_net_line(row)
        .ok_or_else(|| AppError::http("Row did not parse"))?;
    if !entry.established || entry.inode != 48_213 {
        return Err(AppError::http(format!("Unexpected entry {:?}", entry)));
    }
    if cfg!(target_endian = "little") && entry.remote.to_string() != "127.0.0.1:8080" {
        return Err(AppError::http(format!(
            "Unexpected remote {}",
            entry.remote
        )));
    }

    let listening = "   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1000 1";
    let entry = probe::parse_proc_net_line(listening)
        .ok_or_else(|| AppError::http("Listening row did not parse"))?;
    if entry.established {
        return Err(AppError::http("Listening socket counted as established"));
    }
    if probe::parse_proc_net_line("  sl  local_address rem_address   st").is_some() {
        return Err(AppError::http("Header row should not parse"));
    }
    Ok(())
}

#[test]
fn monitor_tracks_latest_and_peak() -> AppResult<()> {
    let monitor = ConnectionMonitor::default();
    monitor.observe(3);
    monitor.observe(7);
    monitor.observe(2);
    if monitor.latest() != 2 || monitor.max() != 7 {
        return Err(AppError::http(format!(
            "latest={} max={}",
            monitor.latest(),
            monitor.max()
        )));
    }
    Ok(())
}

#[test]
fn worker_emits_every_attempt_it_counts() -> AppResult<()> {
    run_async_test(async {
        let (results_tx, mut results_rx) = mpsc::channel::<ReqAttempt>(1024);
        let (stop_tx, stop_rx) = mpsc::channel::<()>(STOP_SIGNAL_CAPACITY);
        let started = Instant::now();
        let context = WorkerContext {
            id: 0,
            template: template()?,
            request_client: Client::new(),
            executor: Arc::new(StubExecutor {
                reply: StubReply::Refused,
            }),
            spacing: None,
            results_tx,
            phase: Arc::new(PhaseCell::new()),
            marks: Arc::new(ProgressMarks::new(started, Duration::from_secs(1), 10)),
        };
        let handle = tokio::spawn(RequestWorker::new(context, stop_rx).run());
        tokio::time::sleep(Duration::from_millis(40)).await;
        stop_tx
            .send(())
            .await
            .map_err(|err| AppError::http(format!("Stop send failed: {}", err)))?;
        let emitted = handle.await?;

        let mut received: u64 = 0;
        while let Ok(attempt) = results_rx.try_recv() {
            if attempt.res_err != "connection refused" || attempt.res_code != 0 {
                return Err(AppError::http(format!("Unexpected attempt {:?}", attempt)));
            }
            received = received.saturating_add(1);
        }
        if emitted == 0 || emitted != received {
            return Err(AppError::http(format!(
                "Worker counted {} attempts but {} arrived",
                emitted, received
            )));
        }
        Ok(())
    })
}

#[test]
fn worker_stopped_before_start_sends_nothing() -> AppResult<()> {
    run_async_test(async {
        let (results_tx, mut results_rx) = mpsc::channel::<ReqAttempt>(8);
        let (stop_tx, stop_rx) = mpsc::channel::<()>(STOP_SIGNAL_CAPACITY);
        stop_tx
            .try_send(())
            .map_err(|err| AppError::http(format!("Stop send failed: {}", err)))?;
        let context = WorkerContext {
            id: 1,
            template: template()?,
            request_client: Client::new(),
            executor: Arc::new(StubExecutor {
                reply: StubReply::Ok,
            }),
            spacing: Some(Duration::from_secs(5)),
            results_tx,
            phase: Arc::new(PhaseCell::new()),
            marks: Arc::new(ProgressMarks::new(Instant::now(), Duration::from_secs(1), 10)),
        };
        let emitted = RequestWorker::new(context, stop_rx).run().await;
        if emitted != 0 || results_rx.try_recv().is_ok() {
            return Err(AppError::http("Stopped worker still issued a request"));
        }
        Ok(())
    })
}

#[test]
fn clean_run_counts_matches_and_finishes_done() -> AppResult<()> {
    run_async_test(async {
        let (inputs, _shutdown_tx, telemetry_rx) =
            inputs(plan(2, 600, 0), StubReply::Ok, Arc::new(NullProbe))?;
        let report = run_load(inputs).await?;

        if report.phase != TimerPhase::Done || report.interrupted {
            return Err(AppError::http(format!("Unexpected report {:?}", report)));
        }
        if report.outcome != RunOutcome::Clean || !report.drained_cleanly {
            return Err(AppError::http(format!(
                "Expected a clean drained run, got {}",
                report.outcome.as_str()
            )));
        }
        let stats = &report.stats;
        if stats.total_attempts == 0 || stats.matching_codes != stats.total_attempts {
            return Err(AppError::http(format!(
                "total={} matching={}",
                stats.total_attempts, stats.matching_codes
            )));
        }
        if stats.latency_digest.is_none() {
            return Err(AppError::http("Final stats should carry a latency digest"));
        }

        let telemetry = telemetry_rx.borrow().clone();
        if telemetry.phase != TimerPhase::Done
            || telemetry.stats.total_attempts != stats.total_attempts
        {
            return Err(AppError::http("Last telemetry does not match the report"));
        }
        Ok(())
    })
}

#[test]
fn refused_connections_degrade_the_run() -> AppResult<()> {
    run_async_test(async {
        let (inputs, _shutdown_tx, _telemetry_rx) =
            inputs(plan(1, 300, 0), StubReply::Refused, Arc::new(NullProbe))?;
        let report = run_load(inputs).await?;

        if report.outcome != RunOutcome::Degraded {
            return Err(AppError::http(format!(
                "Expected degraded, got {}",
                report.outcome.as_str()
            )));
        }
        let stats = &report.stats;
        let refused = stats
            .error_types
            .get("connection refused")
            .copied()
            .unwrap_or(0);
        if stats.total_attempts == 0
            || refused != stats.total_attempts
            || stats.error_count != stats.total_attempts
        {
            return Err(AppError::http(format!(
                "total={} refused={} errors={}",
                stats.total_attempts, refused, stats.error_count
            )));
        }
        if stats.matching_codes != 0 {
            return Err(AppError::http("Refused attempts cannot match"));
        }
        Ok(())
    })
}

#[test]
fn interrupt_stops_the_run_early() -> AppResult<()> {
    run_async_test(async {
        let (inputs, shutdown_tx, _telemetry_rx) =
            inputs(plan(3, 10_000, 0), StubReply::Ok, Arc::new(NullProbe))?;
        let collaborators = inputs.collaborators.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(shutdown_tx.send(()));
        });

        let started = std::time::Instant::now();
        let report = run_load(inputs).await?;
        if !report.interrupted || report.outcome != RunOutcome::Interrupted {
            return Err(AppError::http("Run was not reported as interrupted"));
        }
        if started.elapsed() >= Duration::from_secs(5) {
            return Err(AppError::http("Interrupt did not cut the run short"));
        }
        if !collaborators.is_cancelled() {
            return Err(AppError::http("Collaborators were not cancelled"));
        }
        if report.stats.total_attempts == 0 {
            return Err(AppError::http("No attempts recorded before interrupt"));
        }
        Ok(())
    })
}

#[test]
fn ramped_run_marks_ramp_chunks_and_reports_stuck_connections() -> AppResult<()> {
    run_async_test(async {
        let (inputs, _shutdown_tx, telemetry_rx) =
            inputs(plan(2, 1_000, 300), StubReply::Ok, Arc::new(FixedProbe(2)))?;
        let report = run_load(inputs).await?;

        if report.drained_cleanly {
            return Err(AppError::http(
                "Connections that never close should exhaust the drain bound",
            ));
        }
        if report.max_open_conns != 2 {
            return Err(AppError::http(format!(
                "Unexpected peak connections {}",
                report.max_open_conns
            )));
        }
        let marks = telemetry_rx.borrow().marks.clone();
        if !marks.iter().any(|mark| mark.ramp) {
            return Err(AppError::http("No chunk was marked as ramp"));
        }
        if report.phase != TimerPhase::Done {
            return Err(AppError::http("Run did not finish"));
        }
        Ok(())
    })
}

#[test]
fn interrupt_sent_before_the_run_starts_is_not_lost() -> AppResult<()> {
    run_async_test(async {
        let (inputs, shutdown_tx, _telemetry_rx) =
            inputs(plan(1, 2_000, 0), StubReply::Ok, Arc::new(NullProbe))?;
        if shutdown_tx.send(()).is_err() {
            return Err(AppError::http("Interrupt had no receiver"));
        }

        let started = std::time::Instant::now();
        let report = run_load(inputs).await?;
        if !report.interrupted || report.outcome != RunOutcome::Interrupted {
            return Err(AppError::http("Early interrupt was not reported"));
        }
        if started.elapsed() >= Duration::from_millis(1_500) {
            return Err(AppError::http(format!(
                "Early interrupt did not cut the run short: {:?}",
                started.elapsed()
            )));
        }
        Ok(())
    })
}

#[test]
fn ramped_run_walks_every_phase_in_order() -> AppResult<()> {
    run_async_test(async {
        let (inputs, _shutdown_tx, telemetry_rx) =
            inputs(plan(2, 1_000, 300), StubReply::Ok, Arc::new(FixedProbe(2)))?;
        let watcher = watch_phases(telemetry_rx);
        let report = run_load(inputs).await?;
        let seen = watcher
            .await
            .map_err(|err| AppError::http(format!("Phase watcher failed: {}", err)))?;
        let order = phase_order(&seen);

        if order
            .windows(2)
            .any(|pair| matches!(pair, [earlier, later] if earlier >= later))
        {
            return Err(AppError::http(format!("Phases went backwards: {:?}", order)));
        }
        for expected in [
            TimerPhase::RampUp,
            TimerPhase::Main,
            TimerPhase::RampDown,
            TimerPhase::Draining,
            TimerPhase::Done,
        ] {
            if !order.contains(&expected) {
                return Err(AppError::http(format!(
                    "Phase {} never published: {:?}",
                    expected, order
                )));
            }
        }
        if order.last() != Some(&TimerPhase::Done) || report.phase != TimerPhase::Done {
            return Err(AppError::http(format!("Run did not end in done: {:?}", order)));
        }
        let ramp_down_at = seen
            .iter()
            .find(|(phase, _)| *phase == TimerPhase::RampDown)
            .map(|(_, elapsed)| *elapsed)
            .unwrap_or_default();
        if ramp_down_at < Duration::from_millis(700) || ramp_down_at >= Duration::from_millis(1_000)
        {
            return Err(AppError::http(format!(
                "Ramp-down started at {:?}, expected duration minus ramp",
                ramp_down_at
            )));
        }
        Ok(())
    })
}

#[test]
fn ramp_without_connections_never_reaches_main_but_still_drains() -> AppResult<()> {
    run_async_test(async {
        let (inputs, _shutdown_tx, telemetry_rx) =
            inputs(plan(2, 600, 200), StubReply::Ok, Arc::new(FixedProbe(0)))?;
        let watcher = watch_phases(telemetry_rx);
        let report = run_load(inputs).await?;
        let order = phase_order(
            &watcher
                .await
                .map_err(|err| AppError::http(format!("Phase watcher failed: {}", err)))?,
        );

        if order.contains(&TimerPhase::Main) {
            return Err(AppError::http(format!(
                "Main reached without connections: {:?}",
                order
            )));
        }
        if !order.contains(&TimerPhase::RampUp) || order.last() != Some(&TimerPhase::Done) {
            return Err(AppError::http(format!("Unexpected phases {:?}", order)));
        }
        if !report.drained_cleanly || report.interrupted {
            return Err(AppError::http(format!("Unexpected report {:?}", report)));
        }
        if report.stats.total_attempts == 0 {
            return Err(AppError::http("Workers never ran"));
        }
        Ok(())
    })
}
