// src/batch/processor.rs
// Concurrency-limited scheduler: forms batches, dispatches them, merges results

use std::future::Future;
use std::time::Instant;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::executor::execute_batch;
use super::former::form_batches;
use super::settings::{BatchOptions, BatchSettings, DispatchMode};
use super::stats::{BatchStats, BatchStatsSnapshot};
use super::{BatchItem, BatchOutput, FailedItem};
use crate::config::WorkerConfig;
use crate::error::{BatchError, Result};
use crate::utils::elapsed_ms;

/// Runs many batches through a caller-supplied processor with a ceiling on
/// how many are in flight. Stats belong to this instance alone.
pub struct BatchProcessor {
    settings: BatchSettings,
    stats: Mutex<BatchStats>,
}

impl BatchProcessor {
    pub fn new(settings: BatchSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            stats: Mutex::new(BatchStats::new()),
        })
    }

    /// Processor using the generic defaults of the process-wide config
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        Self::new(BatchSettings::from_config(config))
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Process `items` in batches and return one flat, input-ordered list.
    ///
    /// A successful batch contributes whatever its processor emitted; a batch
    /// that exhausted its retries contributes one `BatchItem::Failed` per input
    /// item. Batch failures never surface as `Err`: the error arm is only
    /// returned when the effective settings are invalid. Empty input returns
    /// an empty list before the settings are looked at.
    pub async fn process_batches<T, R, F, Fut, E>(
        &self,
        items: &[T],
        processor: F,
        options: &BatchOptions,
    ) -> Result<Vec<BatchItem<T, R>>>
    where
        T: Clone,
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
        E: Into<BatchError>,
    {
        self.run(items, &processor, options, None).await
    }

    /// Same as `process_batches`, but stops early once `cancel` fires.
    ///
    /// After cancellation no further batch is started, batches still in flight
    /// resolve as cancelled, and every item that was not processed comes back
    /// as a failure record.
    pub async fn process_batches_with_cancel<T, R, F, Fut, E>(
        &self,
        items: &[T],
        processor: F,
        options: &BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<BatchItem<T, R>>>
    where
        T: Clone,
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
        E: Into<BatchError>,
    {
        self.run(items, &processor, options, Some(cancel)).await
    }

    pub fn stats(&self) -> BatchStatsSnapshot {
        self.stats.lock().snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.lock().reset();
    }

    async fn run<T, R, F, Fut, E>(
        &self,
        items: &[T],
        processor: &F,
        options: &BatchOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<BatchItem<T, R>>>
    where
        T: Clone,
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
        E: Into<BatchError>,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let settings = self.settings.merge(options);
        settings.validate()?;

        let start = Instant::now();
        let batches = form_batches(items, settings.batch_size);
        let total_batches = batches.len();

        if settings.verbose {
            info!(
                items = items.len(),
                batches = total_batches,
                batch_size = settings.batch_size,
                max_concurrent = settings.max_concurrent,
                "Processing items in batches"
            );
        }

        let outcomes = match settings.dispatch {
            DispatchMode::Waves => self.dispatch_waves(&batches, processor, &settings, cancel).await,
            DispatchMode::Pool => self.dispatch_pool(&batches, processor, &settings, cancel).await,
        };

        let mut results = Vec::with_capacity(items.len());
        let mut failed_batches = 0usize;

        for (batch_index, (batch, outcome)) in batches.into_iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(values) => results.extend(values.into_iter().map(BatchItem::Ok)),
                Err(err) => {
                    failed_batches += 1;
                    self.stats.lock().record_error();
                    error!(batch_index, items = batch.len(), error = %err, "Batch failed");

                    let message = err.to_string();
                    results.extend(batch.into_iter().map(|item| {
                        BatchItem::Failed(FailedItem {
                            item,
                            error: message.clone(),
                            batch_index,
                        })
                    }));
                }
            }
        }

        let total_ms = elapsed_ms(start);
        self.stats.lock().record_run(total_batches, items.len(), total_ms);

        if settings.verbose {
            info!(
                batches = total_batches,
                failed_batches,
                results = results.len(),
                elapsed_ms = total_ms,
                "Batch processing complete"
            );
        }

        Ok(results)
    }

    /// Groups of `max_concurrent` batches; each group settles completely
    /// before the next one starts.
    async fn dispatch_waves<T, R, F, Fut, E>(
        &self,
        batches: &[Vec<T>],
        processor: &F,
        settings: &BatchSettings,
        cancel: Option<&CancellationToken>,
    ) -> Vec<Result<Vec<R>>>
    where
        T: Clone,
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
        E: Into<BatchError>,
    {
        let mut outcomes = Vec::with_capacity(batches.len());

        for (wave_index, wave) in batches.chunks(settings.max_concurrent).enumerate() {
            let offset = wave_index * settings.max_concurrent;

            if cancel.is_some_and(CancellationToken::is_cancelled) {
                debug!(wave_index, remaining = batches.len() - offset, "Skipping wave after cancellation");
            } else if settings.verbose {
                debug!(wave_index, batches = wave.len(), "Dispatching wave");
            }

            let wave_futures = wave
                .iter()
                .enumerate()
                .map(|(i, batch)| self.run_one(batch, offset + i, processor, settings, cancel));

            outcomes.extend(join_all(wave_futures).await);
        }

        outcomes
    }

    /// Fixed pool of `max_concurrent` slots; results are put back in batch order.
    async fn dispatch_pool<T, R, F, Fut, E>(
        &self,
        batches: &[Vec<T>],
        processor: &F,
        settings: &BatchSettings,
        cancel: Option<&CancellationToken>,
    ) -> Vec<Result<Vec<R>>>
    where
        T: Clone,
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
        E: Into<BatchError>,
    {
        let mut outcomes: Vec<(usize, Result<Vec<R>>)> = stream::iter(batches.iter().enumerate())
            .map(|(index, batch)| async move {
                (index, self.run_one(batch, index, processor, settings, cancel).await)
            })
            .buffer_unordered(settings.max_concurrent)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn run_one<T, R, F, Fut, E>(
        &self,
        batch: &[T],
        batch_index: usize,
        processor: &F,
        settings: &BatchSettings,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<R>>
    where
        T: Clone,
        F: Fn(Vec<T>, usize) -> Fut,
        Fut: Future<Output = std::result::Result<BatchOutput<R>, E>>,
        E: Into<BatchError>,
    {
        let execution = execute_batch(batch, batch_index, processor, settings, &self.stats);

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(BatchError::Cancelled),
                    result = execution => result,
                }
            }
            None => execution.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn processor_with(batch_size: usize, max_concurrent: usize) -> BatchProcessor {
        BatchProcessor::new(
            BatchSettings::default()
                .with_batch_size(batch_size)
                .with_max_concurrent(max_concurrent)
                .with_max_retries(0)
                .with_retry_delay(Duration::from_millis(1))
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let result = BatchProcessor::new(BatchSettings::default().with_batch_size(0));
        assert!(matches!(result, Err(BatchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_empty_input_never_calls_processor() {
        let processor = processor_with(3, 2);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let results = processor
            .process_batches(
                &Vec::<u32>::new(),
                |batch: Vec<u32>, _index: usize| {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    async move { Ok::<_, BatchError>(BatchOutput::Many(batch)) }
                },
                &BatchOptions::default(),
            )
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(processor.stats().batches_processed, 0);
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected() {
        let processor = processor_with(3, 2);
        let result = processor
            .process_batches(
                &[1u32, 2],
                |batch: Vec<u32>, _index: usize| async move {
                    Ok::<_, BatchError>(BatchOutput::Many(batch))
                },
                &BatchOptions::new().max_concurrent(0),
            )
            .await;

        assert!(matches!(result, Err(BatchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_empty_input_skips_override_validation() {
        let processor = processor_with(3, 2);
        let result = processor
            .process_batches(
                &Vec::<u32>::new(),
                |batch: Vec<u32>, _index: usize| async move {
                    Ok::<_, BatchError>(BatchOutput::Many(batch))
                },
                &BatchOptions::new().batch_size(0),
            )
            .await;

        assert_eq!(result, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let processor = processor_with(2, 3);
        let items: Vec<u64> = (0..9).collect();

        // Later batches finish first
        let results = processor
            .process_batches(
                &items,
                |batch: Vec<u64>, index: usize| async move {
                    tokio::time::sleep(Duration::from_millis(30 - (index as u64 * 5))).await;
                    Ok::<_, BatchError>(BatchOutput::Many(batch.iter().map(|v| v * 10).collect()))
                },
                &BatchOptions::default(),
            )
            .await
            .unwrap();

        let values: Vec<u64> = results.into_iter().filter_map(BatchItem::ok).collect();
        assert_eq!(values, (0..9).map(|v| v * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_aggregate_processor_output_arity() {
        let processor = processor_with(4, 2);
        let items: Vec<u32> = (1..=10).collect();

        let results = processor
            .process_batches(
                &items,
                |batch: Vec<u32>, _index: usize| async move {
                    Ok::<_, BatchError>(BatchOutput::Single(batch.iter().sum::<u32>()))
                },
                &BatchOptions::default(),
            )
            .await
            .unwrap();

        let sums: Vec<u32> = results.into_iter().filter_map(BatchItem::ok).collect();
        assert_eq!(sums, vec![10, 26, 19]);
    }

    #[tokio::test]
    async fn test_pool_mode_keeps_order() {
        let processor = processor_with(1, 2);
        let items: Vec<u64> = (0..6).collect();

        let results = processor
            .process_batches(
                &items,
                |batch: Vec<u64>, index: usize| async move {
                    tokio::time::sleep(Duration::from_millis(if index % 2 == 0 { 25 } else { 5 })).await;
                    Ok::<_, BatchError>(BatchOutput::Many(batch))
                },
                &BatchOptions::new().dispatch(DispatchMode::Pool),
            )
            .await
            .unwrap();

        let values: Vec<u64> = results.into_iter().filter_map(BatchItem::ok).collect();
        assert_eq!(values, items);
    }

    #[tokio::test]
    async fn test_stats_updated_once_per_call() {
        let processor = processor_with(3, 2);
        let items: Vec<u32> = (0..7).collect();

        processor
            .process_batches(
                &items,
                |batch: Vec<u32>, _index: usize| async move {
                    Ok::<_, BatchError>(BatchOutput::Many(batch))
                },
                &BatchOptions::default(),
            )
            .await
            .unwrap();

        let stats = processor.stats();
        assert_eq!(stats.batches_processed, 3);
        assert_eq!(stats.items_processed, 7);
        assert_eq!(stats.errors, 0);
        assert!(stats.avg_batch_time_ms >= 0.0);

        processor.reset_stats();
        assert_eq!(processor.stats().items_processed, 0);
    }
}
