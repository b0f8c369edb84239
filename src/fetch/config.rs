//! Batched fetch configuration

use std::time::Duration;

use rand::Rng;

/// Batched fetch configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Suppliers dispatched together per window (0 = all in one window)
    pub batch_size: usize,

    /// Lower bound of the delay between windows
    pub min_pace: Duration,

    /// Upper bound of the delay between windows
    pub max_pace: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 0,
            min_pace: Duration::ZERO,
            max_pace: Duration::ZERO,
        }
    }
}

impl FetchConfig {
    /// Set the window size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the pacing range between windows
    pub fn pace(mut self, min: Duration, max: Duration) -> Self {
        self.min_pace = min;
        self.max_pace = max.max(min);
        self
    }

    /// Number of windows needed for `count` suppliers
    pub fn window_count(&self, count: usize) -> usize {
        match (count, self.batch_size) {
            (0, _) => 0,
            (_, 0) => 1,
            (count, size) => count.div_ceil(size),
        }
    }

    /// Draw a pacing delay from `[min_pace, max_pace]`
    pub(super) fn pace_delay(&self) -> Duration {
        if self.max_pace <= self.min_pace {
            return self.min_pace;
        }
        rand::rng().random_range(self.min_pace..=self.max_pace)
    }
}
