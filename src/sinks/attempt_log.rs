use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult, SinkError};
use crate::metrics::ReqAttempt;
use crate::shutdown::ShutdownSender;

/// Samples buffered ahead of the writer; a full buffer drops the sample.
pub const ATTEMPT_LOG_CAPACITY: usize = 16_384;

#[derive(Debug)]
enum LogCommand {
    Attempt(ReqAttempt),
    Finish(serde_json::Value),
}

/// Cheap handle offering attempts to the writer task.
#[derive(Debug, Clone)]
pub struct AttemptLog {
    tx: mpsc::Sender<LogCommand>,
    sampling: f64,
    dropped: Arc<AtomicU64>,
}

impl AttemptLog {
    /// Keeps `attempt` with probability `sampling`. Never blocks.
    pub fn offer(&self, attempt: ReqAttempt) {
        if self.sampling < 1.0 && rand::random::<f64>() >= self.sampling {
            return;
        }
        if self.tx.try_send(LogCommand::Attempt(attempt)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Appends the final report and closes the document.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer task has already stopped.
    pub async fn finish(self, report: serde_json::Value) -> AppResult<()> {
        let dropped = self.dropped();
        if dropped > 0 {
            warn!("Attempt log dropped {} samples under load", dropped);
        }
        self.tx
            .send(LogCommand::Finish(report))
            .await
            .map_err(|_err| AppError::sink(SinkError::WriterClosed))
    }
}

/// Creates `path` and spawns the task that streams sampled attempts into it.
///
/// The writer returns how many attempts it wrote. On a write failure it sends
/// an interrupt on `shutdown_tx` before returning the error.
///
/// # Errors
///
/// Returns an error when the file cannot be created.
pub fn setup_attempt_writer(
    path: &Path,
    sampling: f64,
    shutdown_tx: &ShutdownSender,
) -> AppResult<(AttemptLog, JoinHandle<AppResult<u64>>)> {
    let file = std::fs::File::create(path).map_err(|err| {
        AppError::sink(SinkError::Create {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let (tx, rx) = mpsc::channel::<LogCommand>(ATTEMPT_LOG_CAPACITY);
    let log = AttemptLog {
        tx,
        sampling,
        dropped: Arc::new(AtomicU64::new(0)),
    };

    let path = path.to_path_buf();
    let shutdown_tx = shutdown_tx.clone();
    let handle = tokio::spawn(async move {
        let writer = BufWriter::new(File::from_std(file));
        let result = write_document(writer, rx, &path).await;
        match &result {
            Ok(written) => debug!("Attempt log wrote {} attempts to {}", written, path.display()),
            Err(err) => {
                error!("{}", err);
                drop(shutdown_tx.send(()));
            }
        }
        result
    });
    Ok((log, handle))
}

async fn write_document(
    mut writer: BufWriter<File>,
    mut rx: mpsc::Receiver<LogCommand>,
    path: &Path,
) -> AppResult<u64> {
    let io_err = |err: std::io::Error| {
        AppError::sink(SinkError::Write {
            path: path.to_path_buf(),
            source: err,
        })
    };
    writer.write_all(b"{\"attempts\":[").await.map_err(io_err)?;

    let mut written: u64 = 0;
    let mut report = serde_json::Value::Null;
    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Attempt(attempt) => {
                let line = serde_json::to_vec(&attempt).map_err(|err| {
                    AppError::sink(SinkError::Serialize {
                        context: "attempt",
                        source: err,
                    })
                })?;
                if written > 0 {
                    writer.write_all(b",\n").await.map_err(io_err)?;
                }
                writer.write_all(&line).await.map_err(io_err)?;
                written = written.saturating_add(1);
            }
            LogCommand::Finish(value) => {
                report = value;
                break;
            }
        }
    }

    let report = serde_json::to_vec(&report).map_err(|err| {
        AppError::sink(SinkError::Serialize {
            context: "report",
            source: err,
        })
    })?;
    writer.write_all(b"],\n\"report\":").await.map_err(io_err)?;
    writer.write_all(&report).await.map_err(io_err)?;
    writer.write_all(b"}\n").await.map_err(io_err)?;
    writer.flush().await.map_err(io_err)?;
    Ok(written)
}

/// Path helper used by the summary.
#[must_use]
pub fn display_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_err| path.to_path_buf())
}
