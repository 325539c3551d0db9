use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

pub const DEFAULT_PROGRESS_CHUNKS: usize = 30;

const RAMP_BIT: u8 = 0b01;
const ERROR_BIT: u8 = 0b10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkMark {
    pub ramp: bool,
    pub error: bool,
}

/// Per-chunk ramp/error flags over the run duration, written by workers and
/// read by the progress renderer.
#[derive(Debug)]
pub struct ProgressMarks {
    started: Instant,
    duration: Duration,
    chunks: Vec<AtomicU8>,
}

impl ProgressMarks {
    #[must_use]
    pub fn new(started: Instant, duration: Duration, size: usize) -> Self {
        let size = size.max(1);
        Self {
            started,
            duration,
            chunks: (0..size).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// `floor(elapsed / (duration / size))`, clamped to the last chunk.
    #[must_use]
    pub fn chunk_index_for(&self, elapsed: Duration) -> usize {
        let last = self.chunks.len().saturating_sub(1);
        let size = u128::try_from(self.chunks.len()).unwrap_or(u128::MAX);
        let chunk_ns = self.duration.as_nanos().checked_div(size).unwrap_or(0);
        if chunk_ns == 0 {
            return last;
        }
        let index = elapsed.as_nanos().checked_div(chunk_ns).unwrap_or(0);
        usize::try_from(index).unwrap_or(usize::MAX).min(last)
    }

    pub fn mark_ramp(&self, at: Instant) {
        self.mark(at, RAMP_BIT);
    }

    pub fn mark_error(&self, at: Instant) {
        self.mark(at, ERROR_BIT);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ChunkMark> {
        self.chunks
            .iter()
            .map(|chunk| {
                let bits = chunk.load(Ordering::Relaxed);
                ChunkMark {
                    ramp: bits & RAMP_BIT != 0,
                    error: bits & ERROR_BIT != 0,
                }
            })
            .collect()
    }

    fn mark(&self, at: Instant, bit: u8) {
        let index = self.chunk_index_for(at.saturating_duration_since(self.started));
        if let Some(chunk) = self.chunks.get(index) {
            chunk.fetch_or(bit, Ordering::Relaxed);
        }
    }
}
