use std::ffi::OsString;
use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::app::{RunSummary, print_summary, run_local};
use crate::args::SurgeArgs;
use crate::config::{DEFAULT_CONFIG_FILES, RunConfig, apply_config, build_run_config, load_config};
use crate::error::AppResult;
use crate::shutdown::shutdown_channel;
use crate::shutdown_handlers::setup_signal_shutdown_handler;
use crate::system::init_logging;

/// Process entry: parse, configure, run, and print the summary.
///
/// Degraded and interrupted runs still return `Ok`; only setup and sink
/// failures surface as errors.
///
/// # Errors
///
/// Returns an error when arguments or configuration are invalid, the runtime
/// cannot start, or the run fails fatally.
pub fn run() -> AppResult<()> {
    let Some((mut args, matches)) = parse_args()? else {
        return Ok(());
    };

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }

    init_logging(args.verbose, args.no_color);
    let run_config = build_run_config(&args)?;
    let units = run_config.byte_units;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(run_async(run_config, args.no_color))?;
    print_summary(&summary, units);
    Ok(())
}

fn parse_args() -> AppResult<Option<(SurgeArgs, ArgMatches)>> {
    let mut cmd = SurgeArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    let args = SurgeArgs::from_arg_matches(&matches)?;
    Ok(Some((args, matches)))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }
    std::env::var_os("SURGE_CONFIG").is_none()
        && !DEFAULT_CONFIG_FILES
            .iter()
            .any(|path| Path::new(path).exists())
}

async fn run_async(config: RunConfig, no_color: bool) -> AppResult<RunSummary> {
    let (shutdown_tx, interrupts) = shutdown_channel();
    let signals = setup_signal_shutdown_handler(&shutdown_tx);
    let result = run_local(config, shutdown_tx, interrupts, no_color).await;
    signals.abort();
    result
}
