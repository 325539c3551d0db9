use serde::Serialize;

/// Single-pass mean/variance estimator (Welford's algorithm).
///
/// Never subtracts two large running sums, so it stays stable for long runs
/// of tightly clustered latencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OnlineVariance {
    count: u64,
    mean: f64,
    m2: f64,
}

impl OnlineVariance {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.count = self.count.saturating_add(1);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Folds another estimator into this one (Chan et al. pairwise update).
    pub fn merge(&mut self, other: &OnlineVariance) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count.saturating_add(other.count);
        let delta = other.mean - self.mean;
        let total = count as f64;
        let ours = self.count as f64;
        let theirs = other.count as f64;
        self.mean += delta * theirs / total;
        self.m2 += other.m2 + delta * delta * ours * theirs / total;
        self.count = count;
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n - 1 denominator); zero below two samples.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / self.count.saturating_sub(1) as f64
    }

    /// Population variance (n denominator); zero when empty.
    #[must_use]
    pub fn population_variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.m2 / self.count as f64
    }

    #[must_use]
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    #[must_use]
    pub fn population_stddev(&self) -> f64 {
        self.population_variance().sqrt()
    }

    /// Coefficient of variation (sample stddev / mean); zero for a zero mean.
    #[must_use]
    pub fn cv(&self) -> f64 {
        if self.mean == 0.0 {
            return 0.0;
        }
        self.stddev() / self.mean
    }

    /// Standard error of the mean.
    #[must_use]
    pub fn stderr(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.stddev() / (self.count as f64).sqrt()
    }
}
