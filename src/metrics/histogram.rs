use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hdrhistogram::Histogram;
use hdrhistogram::serialization::{Deserializer, Serializer, V2Serializer};
use std::io::Cursor;

use crate::error::{AppError, AppResult, MetricsError};

/// Significant figures kept by the run-wide latency digest.
pub const DEFAULT_SIGFIG: u8 = 3;

/// Mergeable streaming quantile digest over nanosecond latencies.
///
/// Backed by an auto-resizing HDR histogram, so memory stays bounded by the
/// precision rather than by the number of samples.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a digest with [`DEFAULT_SIGFIG`] significant figures.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> AppResult<Self> {
        Self::with_sigfig(DEFAULT_SIGFIG)
    }

    /// Create a digest with an explicit precision (1..=5 significant figures).
    ///
    /// # Errors
    ///
    /// Returns an error if `sigfig` is out of range or the histogram cannot be created.
    pub fn with_sigfig(sigfig: u8) -> AppResult<Self> {
        if !(1..=5).contains(&sigfig) {
            return Err(AppError::metrics(MetricsError::InvalidPrecision { sigfig }));
        }
        let hist = Histogram::<u64>::new(sigfig).map_err(|err| {
            AppError::metrics(MetricsError::Histogram {
                context: "create",
                source: Box::new(err),
            })
        })?;
        Ok(Self { hist })
    }

    /// Record one latency value in nanoseconds. Zero is stored as 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be recorded.
    pub fn record(&mut self, latency_ns: u64) -> AppResult<()> {
        self.hist.record(latency_ns.max(1)).map_err(|err| {
            AppError::metrics(MetricsError::Histogram {
                context: "record",
                source: Box::new(err),
            })
        })
    }

    /// Merge another digest into this one.
    ///
    /// # Errors
    ///
    /// Returns an error if the merge fails.
    pub fn merge(&mut self, other: &LatencyHistogram) -> AppResult<()> {
        self.hist.add(&other.hist).map_err(|err| {
            AppError::metrics(MetricsError::Histogram {
                context: "merge",
                source: Box::new(err),
            })
        })
    }

    /// Value at quantile `q` in `[0, 1]`; zero when empty.
    #[must_use]
    pub fn quantile(&self, q: f64) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.hist.value_at_quantile(q.clamp(0.0, 1.0))
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    #[must_use]
    pub fn max(&self) -> u64 {
        self.hist.max()
    }

    /// Encode the digest as base64 (HdrHistogram V2 format).
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be serialized.
    pub fn encode_base64(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        V2Serializer::new()
            .serialize(&self.hist, &mut buffer)
            .map_err(|err| {
                AppError::metrics(MetricsError::Histogram {
                    context: "serialize",
                    source: Box::new(err),
                })
            })?;
        Ok(B64.encode(buffer))
    }

    /// Decode a base64 digest produced by [`LatencyHistogram::encode_base64`].
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded or deserialized.
    pub fn decode_base64(encoded: &str) -> AppResult<Self> {
        let bytes = B64.decode(encoded.as_bytes()).map_err(|err| {
            AppError::metrics(MetricsError::Histogram {
                context: "decode",
                source: Box::new(err),
            })
        })?;
        let mut cursor = Cursor::new(bytes);
        let mut hist: Histogram<u64> = Deserializer::new()
            .deserialize(&mut cursor)
            .map_err(|err| {
                AppError::metrics(MetricsError::Histogram {
                    context: "deserialize",
                    source: Box::new(err),
                })
            })?;
        hist.auto(true);
        Ok(Self { hist })
    }
}
