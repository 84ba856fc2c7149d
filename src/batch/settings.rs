// src/batch/settings.rs
// Per-processor run configuration and per-call overrides

use std::time::Duration;

use serde::Serialize;

use crate::config::WorkerConfig;
use crate::error::{BatchError, Result};

/// How batches are dispatched once formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DispatchMode {
    /// Up to `max_concurrent` batches start together and the whole group
    /// settles before the next group starts.
    #[default]
    Waves,
    /// A fixed pool of `max_concurrent` slots; the next batch starts as soon
    /// as any slot frees up. Output order is unchanged.
    Pool,
}

/// Immutable settings a processor is created with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSettings {
    pub batch_size: usize,
    /// Maximum batches in flight at once
    pub max_concurrent: usize,
    pub max_retries: u32,
    /// Base backoff, doubled for every further retry
    pub retry_delay: Duration,
    /// Wall-clock budget for a single attempt
    pub timeout: Duration,
    pub verbose: bool,
    pub dispatch: DispatchMode,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

impl BatchSettings {
    /// Generic defaults from the process-wide configuration
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            batch_size: config.performance.batch_size,
            max_concurrent: config.performance.max_concurrent_searches,
            max_retries: config.performance.max_retries,
            retry_delay: config.retry_delay(),
            timeout: config.database_rpc_timeout(),
            verbose: config.verbose,
            dispatch: DispatchMode::Waves,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 1 {
            return Err(BatchError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if self.max_concurrent < 1 {
            return Err(BatchError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective settings for one call: every override that is set wins
    pub fn merge(&self, options: &BatchOptions) -> BatchSettings {
        BatchSettings {
            batch_size: options.batch_size.unwrap_or(self.batch_size),
            max_concurrent: options.max_concurrent.unwrap_or(self.max_concurrent),
            max_retries: options.max_retries.unwrap_or(self.max_retries),
            retry_delay: options.retry_delay.unwrap_or(self.retry_delay),
            timeout: options.timeout.unwrap_or(self.timeout),
            verbose: self.verbose,
            dispatch: options.dispatch.unwrap_or(self.dispatch),
        }
    }
}

/// Per-call overrides for `BatchProcessor::process_batches`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    pub batch_size: Option<usize>,
    pub max_concurrent: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub timeout: Option<Duration>,
    pub dispatch: Option<DispatchMode>,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = Some(dispatch);
        self
    }
}
