use std::sync::Arc;

use anyhow::{Context, Result};
use extract::{prompt, summary_from_value, ChatMessage, ChatModel, DocumentSummary, Shape};

use crate::metrics::Metrics;

/// Map step: one chunk of document text to one summary fragment.
#[derive(Clone)]
pub struct ChunkSummarizer {
    model: Arc<dyn ChatModel>,
    metrics: Arc<Metrics>,
}

impl ChunkSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, metrics: Arc<Metrics>) -> Self {
        Self { model, metrics }
    }

    /// A model/network failure is an `Err`; a reply that is not a summary
    /// comes back as an empty analysis with the raw reply in `notes`.
    pub async fn summarize_chunk(&self, segment: &str) -> Result<DocumentSummary> {
        let prompt = prompt::build_chunk_summary_prompt(segment);
        let raw = ask(self.model.as_ref(), &self.metrics, prompt)
            .await
            .context("Failed to summarize chunk")?;

        Ok(parse_summary(&raw))
    }
}

/// Reduce step: many chunk summaries of one document to one summary.
///
/// Deduplicating findings that several chunks raised for the same fact is
/// left to the model's instructions; nothing here checks that it happened.
#[derive(Clone)]
pub struct SummaryMerger {
    model: Arc<dyn ChatModel>,
    metrics: Arc<Metrics>,
}

impl SummaryMerger {
    pub fn new(model: Arc<dyn ChatModel>, metrics: Arc<Metrics>) -> Self {
        Self { model, metrics }
    }

    /// `summaries` must be in chunk order.
    pub async fn merge_summaries(&self, summaries: &[DocumentSummary]) -> Result<DocumentSummary> {
        let summaries_json =
            serde_json::to_string(summaries).context("Failed to serialize chunk summaries")?;
        let prompt = prompt::build_merge_prompt(&summaries_json);
        let raw = ask(self.model.as_ref(), &self.metrics, prompt)
            .await
            .context("Failed to merge chunk summaries")?;

        Ok(parse_summary(&raw))
    }
}

async fn ask(model: &dyn ChatModel, metrics: &Metrics, prompt: String) -> Result<String> {
    let result = model.chat(&[ChatMessage::user(prompt)]).await;
    metrics.record_model_call(result.is_ok());
    result
}

fn parse_summary(raw: &str) -> DocumentSummary {
    let extraction = extract::extract_json_as(raw, Shape::Object);
    if extraction.is_empty() {
        tracing::debug!(raw = %raw, "Summary reply contained no JSON");
    }
    summary_from_value(&extraction.into_value(), raw)
}
