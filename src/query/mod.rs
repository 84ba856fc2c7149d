//! Query result caching.
//!
//! `QueryOptimizer` memoizes the results of async queries keyed by operation
//! name and parameters, with a bounded FIFO cache and a single-attempt
//! timeout on every miss.

pub mod cache;
pub mod optimizer;

pub use cache::{
    CacheableResult, DEFAULT_CACHE_CAPACITY, QueryCache, generate_query_cache_key,
};
pub use optimizer::{QueryOptimizer, QueryStatsSnapshot, running_mean};
