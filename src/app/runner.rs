use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::engine::{DrainPolicy, LoadInputs, Telemetry, default_probe, run_load};
use crate::error::AppResult;
use crate::http::{build_client, build_executor_provider};
use crate::shutdown::{ShutdownReceiver, ShutdownSender};
use crate::sinks::{display_path, setup_attempt_writer};
use crate::system::{RemoteSample, detect_resource_limits, log_resource_report, sample_remote};

use super::progress::setup_progress_indicator;
use super::summary::RunSummary;

#[must_use]
pub fn new_run_id() -> String {
    format!(
        "surge-{}-race-{:08x}",
        env!("CARGO_PKG_VERSION"),
        rand::random::<u32>()
    )
}

/// Runs one load test in this process and returns its summary.
///
/// # Errors
///
/// Returns an error when clients or the attempt log cannot be set up, or when
/// the attempt log fails while writing.
pub async fn run_local(
    config: RunConfig,
    shutdown_tx: ShutdownSender,
    interrupts: ShutdownReceiver,
    no_color: bool,
) -> AppResult<RunSummary> {
    let run_id = new_run_id();
    let concurrency = config.plan.concurrency;
    let target = config.template.url().to_string();
    info!("Run {} against {}", run_id, target);

    log_resource_report(&detect_resource_limits(), concurrency);

    let provider = build_executor_provider(&config.client, concurrency)?;
    let request_client = build_client(&config.client)?;
    let template = Arc::new(config.template);
    let probe = default_probe(template.url()).await;
    let collaborators = CancellationToken::new();

    let preflight = (!config.skip_preflight).then(|| {
        let template = Arc::clone(&template);
        let settings = config.client.clone();
        let cancel = collaborators.child_token();
        tokio::spawn(async move { sample_remote(&template, &settings, cancel).await })
    });

    let attempt_writer = match config.output.as_deref() {
        Some(path) => {
            let (log, handle) = setup_attempt_writer(path, config.log_sampling, &shutdown_tx)?;
            info!("Writing sampled attempts to {}", display_path(path).display());
            Some((log, handle))
        }
        None => None,
    };

    let (telemetry_tx, telemetry_rx) = watch::channel(Telemetry::default());
    let progress_stop = CancellationToken::new();
    let progress = config.progress.then(|| {
        setup_progress_indicator(
            telemetry_rx,
            config.plan.duration,
            no_color,
            progress_stop.clone(),
        )
    });

    let report = run_load(LoadInputs {
        plan: config.plan,
        template: Arc::clone(&template),
        provider,
        request_client,
        probe,
        interrupts,
        collaborators: collaborators.clone(),
        telemetry_tx: Some(telemetry_tx),
        attempt_log: attempt_writer.as_ref().map(|(log, _)| log.clone()),
        drain: DrainPolicy::default(),
    })
    .await?;

    progress_stop.cancel();
    if let Some(progress) = progress
        && let Err(err) = progress.await
    {
        debug!("Progress renderer ended abnormally: {}", err);
    }

    let remote = match preflight {
        Some(task) => {
            collaborators.cancel();
            match task.await {
                Ok(sample) => Some(sample),
                Err(err) => {
                    debug!("Preflight task ended abnormally: {}", err);
                    Some(RemoteSample::default())
                }
            }
        }
        None => None,
    };

    let summary = RunSummary {
        run_id,
        target,
        concurrency,
        remote,
        report,
    };

    if let Some((log, handle)) = attempt_writer {
        let finished = log.finish(serde_json::to_value(&summary)?).await;
        let written = handle.await??;
        finished?;
        info!("Attempt log holds {} attempts", written);
    }
    Ok(summary)
}
