//! Bounded-concurrency batch execution.
//!
//! Input is split into fixed-size batches, dispatched to a caller-supplied
//! async processor a wave at a time, and every batch attempt is raced against
//! a timeout and retried with exponential backoff. Batches that exhaust their
//! retries are turned into per-item failure records instead of aborting the
//! run, so a `process_batches` call yields one flat list the caller scans for
//! errors.

pub mod embedding;
pub mod executor;
pub mod expansion;
pub mod former;
pub mod processor;
pub mod settings;
pub mod stats;

use serde::Serialize;

pub use embedding::{EmbeddingBatchProcessor, EmbeddingGenerator, EmbeddingResult};
pub use executor::execute_batch;
pub use expansion::{ChunkExpander, ChunkExpansionProcessor, ExpandedChunk, SearchChunk};
pub use former::form_batches;
pub use processor::BatchProcessor;
pub use settings::{BatchOptions, BatchSettings, DispatchMode};
pub use stats::{BatchStats, BatchStatsSnapshot, decayed_average};

/// What a processor hands back for one batch: either one value or a list.
///
/// A single value is treated as a one-element list when results are merged.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutput<R> {
    Single(R),
    Many(Vec<R>),
}

impl<R> BatchOutput<R> {
    pub fn into_vec(self) -> Vec<R> {
        match self {
            BatchOutput::Single(value) => vec![value],
            BatchOutput::Many(values) => values,
        }
    }
}

impl<R> From<Vec<R>> for BatchOutput<R> {
    fn from(values: Vec<R>) -> Self {
        BatchOutput::Many(values)
    }
}

/// Record emitted for every input item of a batch that exhausted its retries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem<T> {
    pub item: T,
    pub error: String,
    pub batch_index: usize,
}

/// One entry of a `process_batches` result list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchItem<T, R> {
    Ok(R),
    Failed(FailedItem<T>),
}

impl<T, R> BatchItem<T, R> {
    pub fn is_ok(&self) -> bool {
        matches!(self, BatchItem::Ok(_))
    }

    /// Error message, present only on failure records
    pub fn error(&self) -> Option<&str> {
        match self {
            BatchItem::Ok(_) => None,
            BatchItem::Failed(failed) => Some(&failed.error),
        }
    }

    pub fn ok(self) -> Option<R> {
        match self {
            BatchItem::Ok(value) => Some(value),
            BatchItem::Failed(_) => None,
        }
    }

    pub fn as_ok(&self) -> Option<&R> {
        match self {
            BatchItem::Ok(value) => Some(value),
            BatchItem::Failed(_) => None,
        }
    }

    pub fn as_failed(&self) -> Option<&FailedItem<T>> {
        match self {
            BatchItem::Ok(_) => None,
            BatchItem::Failed(failed) => Some(failed),
        }
    }
}
