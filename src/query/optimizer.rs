// src/query/optimizer.rs
// Memoizes query results behind a single-attempt timeout

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::cache::{CacheableResult, DEFAULT_CACHE_CAPACITY, QueryCache, generate_query_cache_key};
use crate::config::WorkerConfig;
use crate::error::{BatchError, Result};
use crate::utils::{elapsed_ms, with_timeout};

/// Arithmetic mean of all samples so far (0 when there are none)
pub fn running_mean(total_ms: f64, samples: u64) -> f64 {
    if samples == 0 {
        0.0
    } else {
        total_ms / samples as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct QueryStats {
    queries_executed: u64,
    cache_hits: u64,
    total_query_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStatsSnapshot {
    pub queries_executed: u64,
    pub cache_hits: u64,
    pub total_query_time_ms: f64,
    pub avg_query_time_ms: f64,
    pub cache_size: usize,
    pub cache_hit_rate: f64,
}

/// Result cache in front of an arbitrary async query.
///
/// Misses run the query once under the configured timeout; failures are
/// returned to the caller and never retried. Only results without an
/// embedded error are cached.
pub struct QueryOptimizer<R> {
    cache: Mutex<QueryCache<R>>,
    stats: Mutex<QueryStats>,
    timeout: Duration,
    verbose: bool,
}

impl<R: Clone + CacheableResult> QueryOptimizer<R> {
    pub fn new(config: &WorkerConfig) -> Self {
        Self::with_options(config.database_rpc_timeout(), DEFAULT_CACHE_CAPACITY, config.verbose)
    }

    pub fn with_options(timeout: Duration, capacity: usize, verbose: bool) -> Self {
        Self {
            cache: Mutex::new(QueryCache::new(capacity)),
            stats: Mutex::new(QueryStats::default()),
            timeout,
            verbose,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute_query<F, Fut, E>(
        &self,
        operation: &str,
        params: &Value,
        query: F,
    ) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Into<BatchError>,
    {
        let key = generate_query_cache_key(operation, params);

        let cached = self.cache.lock().get(&key).cloned();
        if let Some(hit) = cached {
            self.stats.lock().cache_hits += 1;
            if self.verbose {
                debug!(operation, "Query cache hit");
            }
            return Ok(hit);
        }

        let start = Instant::now();
        let result = match with_timeout(self.timeout, query()).await {
            Ok(result) => result,
            Err(err) => {
                warn!(operation, error = %err, elapsed_ms = elapsed_ms(start), "Query failed");
                return Err(err);
            }
        };

        let query_ms = elapsed_ms(start);
        {
            let mut stats = self.stats.lock();
            stats.queries_executed += 1;
            stats.total_query_time_ms += query_ms;
        }

        if result.carries_error() {
            debug!(operation, "Query result carries an error, not caching");
        } else if let Some((evicted, _)) = self.cache.lock().insert(key, result.clone()) {
            debug!(operation, evicted = %evicted, "Query cache full, evicted oldest entry");
        }

        if self.verbose {
            debug!(operation, elapsed_ms = query_ms, "Query executed");
        }

        Ok(result)
    }

    /// Drop every cached entry
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn stats(&self) -> QueryStatsSnapshot {
        let stats = self.stats.lock().clone();
        let lookups = stats.cache_hits + stats.queries_executed;

        QueryStatsSnapshot {
            queries_executed: stats.queries_executed,
            cache_hits: stats.cache_hits,
            total_query_time_ms: stats.total_query_time_ms,
            avg_query_time_ms: running_mean(stats.total_query_time_ms, stats.queries_executed),
            cache_size: self.cache_len(),
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                stats.cache_hits as f64 / lookups as f64
            },
        }
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = QueryStats::default();
    }
}
