// src/batch/executor.rs
// Runs one batch through the caller's processor with timeout and retry

use std::future::Future;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::settings::BatchSettings;
use super::stats::BatchStats;
use super::BatchOutput;
use crate::error::{BatchError, Result};
use crate::utils::{backoff_delay, elapsed_ms, with_timeout};

/// Execute a single batch.
///
/// Every attempt receives its own copy of the batch and is raced against
/// `settings.timeout`. A failed attempt is retried after
/// `retry_delay * 2^attempt` while fewer than `max_retries` retries have been
/// made; each retry bumps the retry counter once. Every error the processor
/// returns is retried, whatever its variant. When retries run out the last
/// error is returned unchanged.
pub async fn execute_batch<T, R, F, Fut, E>(
    batch: &[T],
    batch_index: usize,
    processor: &F,
    settings: &BatchSettings,
    stats: &Mutex<BatchStats>,
) -> Result<Vec<R>>
where
    T: Clone,
    F: Fn(Vec<T>, usize) -> Fut,
    Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
    E: Into<BatchError>,
{
    let mut attempt: u32 = 0;

    loop {
        let start = Instant::now();
        if settings.verbose {
            debug!(batch_index, items = batch.len(), attempt, "Starting batch");
        }

        match with_timeout(settings.timeout, processor(batch.to_vec(), batch_index)).await {
            Ok(output) => {
                let results = output.into_vec();
                if settings.verbose {
                    info!(
                        batch_index,
                        items = batch.len(),
                        results = results.len(),
                        elapsed_ms = elapsed_ms(start),
                        "Batch completed"
                    );
                }
                return Ok(results);
            }
            Err(err) if attempt < settings.max_retries => {
                let delay = backoff_delay(settings.retry_delay, attempt);
                warn!(
                    batch_index,
                    attempt = attempt + 1,
                    max_retries = settings.max_retries,
                    error = %err,
                    "Batch attempt failed, retrying in {:?}",
                    delay
                );
                stats.lock().record_retry();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    batch_index,
                    attempts = attempt + 1,
                    error = %err,
                    "Batch failed after all retries"
                );
                return Err(err);
            }
        }
    }
}
