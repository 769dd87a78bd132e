//! Pass 1: raw module extraction, one model call per chunk.
//!
//! Chunk calls are independent and run concurrently up to the configured
//! limit. Results land in a slot per chunk so aggregation order is chunk
//! order no matter which call finishes first.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::parse::parse_module_list;
use super::prompts::extraction_prompt;
use crate::error::{ChunkError, ModelError};
use crate::traits::model::{LanguageModel, Prompt};
use crate::types::config::ExtractorConfig;
use crate::types::corpus::Chunk;
use crate::types::module::RawModuleRecord;

/// A chunk whose contribution was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub reason: String,
}

/// Aggregated Pass 1 output.
#[derive(Debug, Clone, Default)]
pub struct RawExtraction {
    /// All records, in chunk order, duplicates kept
    pub records: Vec<RawModuleRecord>,

    /// Chunks submitted
    pub chunks: usize,

    /// Chunks whose call finished (successfully or not) before cancellation
    pub completed: usize,

    /// Chunks that contributed nothing because of a model or parse failure
    pub soft_failures: Vec<ChunkFailure>,

    pub cancelled: bool,
}

/// Pass 1 extractor.
pub struct Extractor<M: LanguageModel> {
    model: M,
    config: ExtractorConfig,
}

impl<M: LanguageModel> Extractor<M> {
    pub fn new(model: M, config: ExtractorConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract raw records from one chunk.
    pub async fn extract_raw(&self, chunk: &Chunk) -> Result<Vec<RawModuleRecord>, ChunkError> {
        let prompt = extraction_prompt(chunk);
        let output = self.complete_with_retry(&prompt, chunk.index).await?;
        let records = parse_module_list(&output)?;
        debug!(chunk = chunk.index, records = records.len(), "Chunk extracted");
        Ok(records)
    }

    /// Extract every chunk, concurrently, and concatenate in chunk order.
    ///
    /// Failed chunks contribute nothing. On cancellation in-flight calls
    /// are dropped and the records collected so far are returned.
    #[instrument(skip_all, fields(model = self.model.model_name()))]
    pub async fn extract_all(
        &self,
        chunks: impl IntoIterator<Item = Chunk>,
        cancel: &CancellationToken,
    ) -> RawExtraction {
        let chunks: Vec<Chunk> = chunks.into_iter().collect();
        let total = chunks.len();
        info!(chunks = total, concurrency = self.config.concurrency, "Starting Pass 1");

        let mut slots: Vec<Option<Vec<RawModuleRecord>>> = (0..total).map(|_| None).collect();
        let mut soft_failures = Vec::new();
        let mut cancelled = false;

        let mut calls = stream::iter(chunks.iter().enumerate())
            .map(|(slot, chunk)| async move { (slot, chunk.index, self.extract_raw(chunk).await) })
            .buffer_unordered(self.config.concurrency.max(1));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = calls.next() => match next {
                    Some((slot, _, Ok(records))) => slots[slot] = Some(records),
                    Some((slot, index, Err(e))) => {
                        warn!(chunk = index, error = %e, "Chunk contributed no records");
                        soft_failures.push(ChunkFailure {
                            chunk: index,
                            reason: e.to_string(),
                        });
                        slots[slot] = Some(Vec::new());
                    }
                    None => break,
                },
            }
        }
        drop(calls);

        let completed = slots.iter().filter(|s| s.is_some()).count();
        if cancelled {
            info!(completed, total, "Pass 1 cancelled; keeping finished chunks");
        }

        soft_failures.sort_by_key(|f| f.chunk);
        let records: Vec<RawModuleRecord> = slots.into_iter().flatten().flatten().collect();

        info!(
            chunks = total,
            completed,
            soft_failures = soft_failures.len(),
            records = records.len(),
            "Pass 1 finished"
        );

        RawExtraction {
            records,
            chunks: total,
            completed,
            soft_failures,
            cancelled,
        }
    }

    /// One model call with a timeout, retried with backoff while the
    /// failure is retryable.
    async fn complete_with_retry(&self, prompt: &Prompt, chunk: usize) -> Result<String, ChunkError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.config.call_timeout,
                self.model.complete(prompt, self.config.max_output_tokens),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout(self.config.call_timeout)),
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| self.config.backoff_for(attempt));
                    warn!(chunk, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Model call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(ChunkError::Model {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}
