use std::io::{IsTerminal, Write};
use std::time::Duration;

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::{ChunkMark, Telemetry, TimerPhase};

use super::format::{format_elapsed, format_latency_ns, group_thousands};

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Renders the live progress line on stderr until the run is done or `stop` fires.
///
/// Does nothing when stderr is not a terminal.
#[must_use]
pub fn setup_progress_indicator(
    mut telemetry_rx: watch::Receiver<Telemetry>,
    duration: Duration,
    no_color: bool,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !std::io::stderr().is_terminal() {
            return;
        }
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let telemetry = telemetry_rx.borrow_and_update().clone();
                    let done = telemetry.phase == TimerPhase::Done;
                    if render_progress_line(&telemetry, duration, no_color).is_err() || done {
                        break;
                    }
                }
            }
        }
        drop(finish_progress_line());
    })
}

fn render_progress_line(
    telemetry: &Telemetry,
    duration: Duration,
    no_color: bool,
) -> Result<(), std::io::Error> {
    let mut out = std::io::stderr();
    queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    for (text, color) in build_progress_line(telemetry, duration) {
        match color {
            Some(color) if !no_color => {
                queue!(out, SetForegroundColor(color), Print(&text), ResetColor)?;
            }
            Some(_) | None => queue!(out, Print(&text))?,
        }
    }
    out.flush()?;
    Ok(())
}

fn finish_progress_line() -> Result<(), std::io::Error> {
    let mut out = std::io::stderr();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn build_progress_line(telemetry: &Telemetry, duration: Duration) -> Vec<(String, Option<Color>)> {
    let stats = &telemetry.stats;
    let eta = duration.saturating_sub(telemetry.elapsed);
    vec![
        (render_bar(&telemetry.marks), None),
        (format!(" {:<9}", telemetry.phase.as_str()), Some(Color::Cyan)),
        (
            format!(
                " {} / ETA {}",
                format_elapsed(telemetry.elapsed),
                format_elapsed(eta)
            ),
            Some(Color::Yellow),
        ),
        (
            format!(
                " | conns {} | reqs {} | {} rps | p50 {}",
                telemetry.open_conns,
                group_thousands(stats.total_attempts),
                group_thousands(stats.attempts_per_sec.current),
                format_latency_ns(stats.latency.quantiles.p50 as f64),
            ),
            None,
        ),
        (
            format!(" | errors {}", group_thousands(stats.error_count)),
            (stats.error_count > 0).then_some(Color::Red),
        ),
    ]
}

/// One character per chunk: `!` error, `~` ramp, `-` otherwise.
fn render_bar(marks: &[ChunkMark]) -> String {
    let mut bar = String::with_capacity(marks.len().saturating_add(2));
    bar.push('[');
    for mark in marks {
        bar.push(match mark {
            ChunkMark { error: true, .. } => '!',
            ChunkMark { ramp: true, .. } => '~',
            ChunkMark { .. } => '-',
        });
    }
    bar.push(']');
    bar
}
