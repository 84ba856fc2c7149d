// src/batch/stats.rs
// Running counters for a batch processor

use serde::Serialize;

/// Exponential-smoothing style running average: `(previous + sample) / 2`.
///
/// Not an arithmetic mean; the newest sample always carries half the weight.
pub fn decayed_average(previous: f64, sample: f64) -> f64 {
    (previous + sample) / 2.0
}

/// Counters owned by a single processor instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
    batches_processed: u64,
    items_processed: u64,
    errors: u64,
    retries: u64,
    avg_batch_time_ms: f64,
}

/// Point-in-time copy of `BatchStats` plus derived values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatsSnapshot {
    pub batches_processed: u64,
    pub items_processed: u64,
    pub errors: u64,
    pub retries: u64,
    pub avg_batch_time_ms: f64,
    pub success_rate: f64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished `process_batches` call into the counters
    pub fn record_run(&mut self, batches: usize, items: usize, elapsed_ms: f64) {
        self.batches_processed += batches as u64;
        self.items_processed += items as u64;
        self.avg_batch_time_ms = decayed_average(self.avg_batch_time_ms, elapsed_ms);
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// One failed batch (retries exhausted or cancelled)
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        let success_rate = if self.batches_processed == 0 {
            1.0
        } else {
            1.0 - (self.errors as f64 / self.batches_processed as f64)
        };

        BatchStatsSnapshot {
            batches_processed: self.batches_processed,
            items_processed: self.items_processed,
            errors: self.errors,
            retries: self.retries,
            avg_batch_time_ms: self.avg_batch_time_ms,
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}
