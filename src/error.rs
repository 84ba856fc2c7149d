// src/error.rs
// Error types for batch execution and query caching

use std::time::Duration;
use thiserror::Error;

/// Errors produced while running a batch or a cached query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("operation timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("processor error: {0}")]
    Processor(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias for Result using BatchError
pub type Result<T> = std::result::Result<T, BatchError>;

impl From<anyhow::Error> for BatchError {
    fn from(err: anyhow::Error) -> Self {
        BatchError::Processor(format!("{:#}", err))
    }
}

impl From<String> for BatchError {
    fn from(s: String) -> Self {
        BatchError::Processor(s)
    }
}

impl From<&str> for BatchError {
    fn from(s: &str) -> Self {
        BatchError::Processor(s.to_string())
    }
}
