pub mod batch;
pub mod cache;
pub mod metrics;
pub mod retry;
pub mod summarizer;

pub use batch::{AbortFlag, BatchError, BatchItem, BatchOutcome, BatchRunner};
pub use cache::SummaryCache;
pub use metrics::{Metrics, MetricsSnapshot, TimedOperation};
pub use retry::{RetryConfig, RetryPolicy};
pub use summarizer::{ChunkSummarizer, SummaryMerger};

use std::sync::Arc;

use anyhow::Result;
use extract::{ChatModel, DocumentSummary};
use futures_util::stream::{self, StreamExt};
use ingest::{AttachedDocument, Chunker, ChunkerConfig, Tokenizer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Token budget of one chunk.
    pub chunk_tokens: usize,
    /// Documents in flight at once in a batch.
    pub concurrency: usize,
    /// Chunk summaries in flight at once within one document.
    pub chunk_concurrency: usize,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: 4000,
            concurrency: 1,
            chunk_concurrency: 1,
            retry: RetryConfig::default(),
        }
    }
}

/// Chunk, summarize every chunk, merge: the per-document half of an analysis.
pub struct DocumentPipeline {
    chunker: Chunker,
    summarizer: ChunkSummarizer,
    merger: SummaryMerger,
    chunk_concurrency: usize,
    metrics: Arc<Metrics>,
}

impl DocumentPipeline {
    pub fn new(
        config: &PipelineConfig,
        tokenizer: Arc<dyn Tokenizer>,
        model: Arc<dyn ChatModel>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let chunker = Chunker::new(
            ChunkerConfig {
                max_tokens: config.chunk_tokens,
            },
            tokenizer,
        );

        Self {
            chunker,
            summarizer: ChunkSummarizer::new(model.clone(), metrics.clone()),
            merger: SummaryMerger::new(model, metrics.clone()),
            chunk_concurrency: config.chunk_concurrency.max(1),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Return the cached summary of `doc`, computing and caching it on a miss.
    ///
    /// The model is never called for a document whose id is already cached.
    pub async fn get_or_compute(
        &self,
        doc: &AttachedDocument,
        cache: &SummaryCache,
    ) -> Result<DocumentSummary> {
        if let Some(summary) = cache.get(&doc.id) {
            tracing::debug!(doc_id = %doc.id, "Summary cache hit");
            self.metrics.record_cache_hit();
            return Ok(summary);
        }

        let timer = TimedOperation::start();
        let (summary, chunk_count) = self.summarize_document(doc).await?;
        self.metrics.record_summarized(timer.elapsed(), chunk_count);

        tracing::info!(
            doc_id = %doc.id,
            name = %doc.name,
            findings = summary.analysis.len(),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Document summarized"
        );

        cache.insert(doc.id, summary.clone());
        Ok(summary)
    }

    async fn summarize_document(&self, doc: &AttachedDocument) -> Result<(DocumentSummary, usize)> {
        let chunks = self.chunker.chunk_document(doc);
        if chunks.is_empty() {
            let summary = DocumentSummary {
                analysis: Vec::new(),
                notes: Some("Document contained no text".to_string()),
            };
            return Ok((summary, 0));
        }

        tracing::debug!(doc_id = %doc.id, chunks = chunks.len(), "Summarizing chunks");

        // `buffered` yields in submission order, so results stay in chunk order
        // whatever order the calls complete in.
        let jobs: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let summarizer = self.summarizer.clone();
                let (doc_id, index, text) = (chunk.doc_id, chunk.index, chunk.text.clone());
                async move {
                    let result = summarizer.summarize_chunk(&text).await;
                    if let Err(e) = &result {
                        tracing::warn!(doc_id = %doc_id, chunk = index, error = %e, "Chunk failed");
                    }
                    result
                }
            })
            .collect();
        let results: Vec<Result<DocumentSummary>> = stream::iter(jobs)
            .buffered(self.chunk_concurrency)
            .collect()
            .await;

        let chunk_summaries = results.into_iter().collect::<Result<Vec<_>>>()?;
        let merged = self.merger.merge_summaries(&chunk_summaries).await?;
        Ok((merged, chunks.len()))
    }
}
