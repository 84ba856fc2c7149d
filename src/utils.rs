// src/utils.rs
// Timeout and backoff helpers shared by the batch executor and query optimizer

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{BatchError, Result};

// ============================================================================
// Timeout utilities
// ============================================================================

/// Race an operation against a timer. The operation's own error wins if it
/// settles first; otherwise the attempt fails with `BatchError::Timeout`.
pub async fn with_timeout<F, T, E>(duration: Duration, operation: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<BatchError>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(BatchError::Timeout { timeout: duration }),
    }
}

// ============================================================================
// Retry utilities
// ============================================================================

/// Delay before retry number `attempt` (zero-indexed): `base * 2^attempt`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX)
}

// ============================================================================
// Timing utilities
// ============================================================================

/// Milliseconds elapsed since `start`, with sub-millisecond precision
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
