//! Running performance estimate.

use serde::{Deserialize, Serialize};

/// Unweighted running mean of every rating folded into a session.
///
/// Each rating carries equal weight regardless of recency, so an early poor
/// rating is never forgotten. As `sample_count` grows the mean responds less
/// to each new rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceState {
    running_mean: f64,
    sample_count: u64,
}

impl PerformanceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one rating into the mean and return the new mean.
    pub fn fold(&mut self, rating: f64) -> f64 {
        let n = self.sample_count as f64;
        self.running_mean = (self.running_mean * n + rating) / (n + 1.0);
        self.sample_count += 1;
        self.running_mean
    }

    pub fn running_mean(&self) -> f64 {
        self.running_mean
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }
}
