// src/batch/embedding.rs
// Batch embedding generation under the embedding provider's tighter limits

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;

use super::processor::BatchProcessor;
use super::settings::{BatchOptions, BatchSettings};
use super::stats::BatchStatsSnapshot;
use super::{BatchItem, BatchOutput};
use crate::config::WorkerConfig;
use crate::error::Result;

/// Texts per embedding batch
pub const EMBEDDING_BATCH_SIZE: usize = 5;

/// Embedding batches in flight at once
pub const EMBEDDING_MAX_CONCURRENT: usize = 3;

/// Anything that turns one text into a vector (remote API, local model, mock)
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResult {
    pub query: String,
    pub embedding: Vec<f32>,
    pub dimensions: usize,
}

pub struct EmbeddingBatchProcessor<G: ?Sized> {
    generator: Arc<G>,
    processor: BatchProcessor,
}

impl<G: EmbeddingGenerator + ?Sized> EmbeddingBatchProcessor<G> {
    pub fn new(generator: Arc<G>, config: &WorkerConfig) -> Result<Self> {
        let settings = BatchSettings::from_config(config)
            .with_batch_size(EMBEDDING_BATCH_SIZE)
            .with_max_concurrent(EMBEDDING_MAX_CONCURRENT)
            .with_timeout(config.embedding_timeout());
        Self::with_settings(generator, settings)
    }

    pub fn with_settings(generator: Arc<G>, settings: BatchSettings) -> Result<Self> {
        Ok(Self {
            generator,
            processor: BatchProcessor::new(settings)?,
        })
    }

    /// Embed every query. Within a batch all queries are embedded at once;
    /// if any of them fails the whole batch is retried, and a batch that runs
    /// out of retries yields one failure record per query.
    pub async fn generate_embeddings(
        &self,
        queries: &[String],
        options: &BatchOptions,
    ) -> Result<Vec<BatchItem<String, EmbeddingResult>>> {
        let generator = &self.generator;

        self.processor
            .process_batches(
                queries,
                |batch: Vec<String>, _batch_index: usize| async move {
                    let embeddings =
                        try_join_all(batch.iter().map(|query| generator.generate_embedding(query)))
                            .await?;

                    let results = batch
                        .into_iter()
                        .zip(embeddings)
                        .map(|(query, embedding)| EmbeddingResult {
                            dimensions: embedding.len(),
                            query,
                            embedding,
                        })
                        .collect();

                    Ok::<_, anyhow::Error>(BatchOutput::Many(results))
                },
                options,
            )
            .await
    }

    pub fn settings(&self) -> &BatchSettings {
        self.processor.settings()
    }

    pub fn stats(&self) -> BatchStatsSnapshot {
        self.processor.stats()
    }

    pub fn reset_stats(&self) {
        self.processor.reset_stats();
    }
}
