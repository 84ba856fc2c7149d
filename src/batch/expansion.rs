// src/batch/expansion.rs
// Batch chunk expansion that falls back to the original text on failure

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::processor::BatchProcessor;
use super::settings::{BatchOptions, BatchSettings};
use super::stats::BatchStatsSnapshot;
use super::{BatchItem, BatchOutput};
use crate::config::WorkerConfig;
use crate::error::{BatchError, Result};

/// Chunks per expansion batch
pub const EXPANSION_BATCH_SIZE: usize = 10;

/// Expansion batches in flight at once
pub const EXPANSION_MAX_CONCURRENT: usize = 5;

/// A search hit pointing at one chunk of a stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchChunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
}

/// Widens a chunk with its surrounding document context
#[async_trait]
pub trait ChunkExpander: Send + Sync {
    async fn expand_chunk(&self, chunk: &SearchChunk) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedChunk {
    pub chunk: SearchChunk,
    pub expanded_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion_error: Option<String>,
}

impl ExpandedChunk {
    /// Fallback record: the original chunk text stands in for the expansion
    pub fn fallback(chunk: SearchChunk, error: impl Into<String>) -> Self {
        Self {
            expanded_text: chunk.text.clone(),
            chunk,
            expansion_error: Some(error.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.expansion_error.is_some()
    }
}

pub struct ChunkExpansionProcessor<X: ?Sized> {
    expander: Arc<X>,
    processor: BatchProcessor,
}

impl<X: ChunkExpander + ?Sized> ChunkExpansionProcessor<X> {
    pub fn new(expander: Arc<X>, config: &WorkerConfig) -> Result<Self> {
        let settings = BatchSettings::from_config(config)
            .with_batch_size(EXPANSION_BATCH_SIZE)
            .with_max_concurrent(EXPANSION_MAX_CONCURRENT);
        Self::with_settings(expander, settings)
    }

    pub fn with_settings(expander: Arc<X>, settings: BatchSettings) -> Result<Self> {
        Ok(Self {
            expander,
            processor: BatchProcessor::new(settings)?,
        })
    }

    /// Expand every chunk. A chunk whose expansion fails is returned with its
    /// original text and `expansion_error` set; it is never retried.
    pub async fn expand_chunks(
        &self,
        chunks: &[SearchChunk],
        options: &BatchOptions,
    ) -> Result<Vec<BatchItem<SearchChunk, ExpandedChunk>>> {
        let expander = &self.expander;

        self.processor
            .process_batches(
                chunks,
                |batch: Vec<SearchChunk>, batch_index: usize| async move {
                    let expansions =
                        join_all(batch.iter().map(|chunk| expander.expand_chunk(chunk))).await;

                    let results = batch
                        .into_iter()
                        .zip(expansions)
                        .map(|(chunk, expansion)| match expansion {
                            Ok(expanded_text) => ExpandedChunk {
                                chunk,
                                expanded_text,
                                expansion_error: None,
                            },
                            Err(e) => {
                                warn!(
                                    batch_index,
                                    document_id = %chunk.document_id,
                                    chunk_index = chunk.chunk_index,
                                    error = %e,
                                    "Chunk expansion failed, keeping original text"
                                );
                                ExpandedChunk::fallback(chunk, format!("{:#}", e))
                            }
                        })
                        .collect::<Vec<_>>();

                    let fallbacks = results.iter().filter(|c| c.is_fallback()).count();
                    if fallbacks > 0 {
                        warn!(
                            batch_index,
                            fallbacks,
                            total = results.len(),
                            "Batch expanded with fallbacks"
                        );
                    }

                    Ok::<_, BatchError>(BatchOutput::Many(results))
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
