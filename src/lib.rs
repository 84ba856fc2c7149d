// src/lib.rs
// Grünerator worker core - batched AI calls with bounded concurrency, retry and caching

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod batch;
pub mod config;
pub mod error;
pub mod query;
pub mod utils;

pub use batch::{
    BatchItem, BatchOptions, BatchOutput, BatchProcessor, BatchSettings, DispatchMode, FailedItem,
};
pub use config::{CONFIG, WorkerConfig};
pub use error::{BatchError, Result};
pub use query::{QueryOptimizer, generate_query_cache_key};
