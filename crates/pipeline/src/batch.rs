use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use extract::DocumentSummary;
use futures_util::future::join_all;
use ingest::{AttachedDocument, DocumentId};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::cache::SummaryCache;
use crate::retry::RetryPolicy;
use crate::DocumentPipeline;

/// Run-level stop switch. Checked before each document is dequeued; calls
/// already in flight are never interrupted.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Position in the submitted slice.
    pub index: usize,
    pub document_id: DocumentId,
    pub summary: DocumentSummary,
}

#[derive(Debug, Error)]
#[error("Document '{name}' ({document_id}) failed: {error:#}")]
pub struct BatchError {
    pub index: usize,
    pub document_id: DocumentId,
    pub name: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successful documents, in input order.
    pub results: Vec<BatchItem>,
    /// Failed documents, in input order.
    pub errors: Vec<BatchError>,
    /// Documents never started because the run was aborted.
    pub skipped: Vec<DocumentId>,
}

impl BatchOutcome {
    pub fn summaries(&self) -> Vec<DocumentSummary> {
        self.results.iter().map(|item| item.summary.clone()).collect()
    }
}

/// Fixed-width worker pool over a queue of document indices.
///
/// Workers run as futures on the calling task, so with width 1 documents are
/// processed strictly one after another.
pub struct BatchRunner {
    pipeline: Arc<DocumentPipeline>,
    retry: RetryPolicy,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<DocumentPipeline>, retry: RetryPolicy) -> Self {
        Self { pipeline, retry }
    }

    /// Summarize `docs` with at most `concurrency` documents in flight.
    ///
    /// A failing document is recorded and the rest continue. A document id
    /// submitted twice is processed once; the repeat is recorded as an error.
    pub async fn run_batch(
        &self,
        docs: &[AttachedDocument],
        cache: &SummaryCache,
        concurrency: usize,
        abort: &AbortFlag,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if docs.is_empty() {
            return outcome;
        }

        let (job_tx, job_rx) = mpsc::unbounded_channel::<usize>();
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for (index, doc) in docs.iter().enumerate() {
            if seen.insert(doc.id) {
                // The receiver is alive until the end of this function.
                let _ = job_tx.send(index);
            } else {
                duplicates.push(index);
            }
        }
        drop(job_tx);

        let width = concurrency.clamp(1, seen.len());
        let job_rx = Mutex::new(job_rx);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        tracing::info!(documents = docs.len(), width, "Starting document batch");

        let workers = (0..width).map(|worker| {
            let job_rx = &job_rx;
            let result_tx = result_tx.clone();
            async move {
                loop {
                    let next = {
                        let mut queue = job_rx.lock().await;
                        if abort.is_aborted() {
                            None
                        } else {
                            queue.recv().await
                        }
                    };
                    let Some(index) = next else { break };

                    let doc = &docs[index];
                    tracing::debug!(worker, doc_id = %doc.id, "Worker picked document");
                    let result = self
                        .retry
                        .retry("summarize_document", || self.pipeline.get_or_compute(doc, cache))
                        .await;
                    let _ = result_tx.send((index, result));
                }
            }
        })
        .collect::<Vec<_>>();
        drop(result_tx);
        join_all(workers).await;

        let mut slots: Vec<Option<anyhow::Result<DocumentSummary>>> =
            (0..docs.len()).map(|_| None).collect();
        while let Ok((index, result)) = result_rx.try_recv() {
            slots[index] = Some(result);
        }
        for index in duplicates {
            slots[index] = Some(Err(anyhow::anyhow!("Document submitted twice in one batch")));
        }

        for (index, slot) in slots.into_iter().enumerate() {
            let doc = &docs[index];
            match slot {
                Some(Ok(summary)) => outcome.results.push(BatchItem {
                    index,
                    document_id: doc.id,
                    summary,
                }),
                Some(Err(error)) => {
                    tracing::warn!(doc_id = %doc.id, name = %doc.name, error = %error, "Document failed");
                    self.pipeline.metrics().record_document_failure();
                    outcome.errors.push(BatchError {
                        index,
                        document_id: doc.id,
                        name: doc.name.clone(),
                        error,
                    });
                }
                None => outcome.skipped.push(doc.id),
            }
        }

        tracing::info!(
            succeeded = outcome.results.len(),
            failed = outcome.errors.len(),
            skipped = outcome.skipped.len(),
            "Document batch finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::CharTokenizer;
    use crate::{Metrics, PipelineConfig};
    use extract::testing::ScriptedModel;
    use std::time::Duration;

    const SUMMARY: &str =
        r#"{"analysis": [{"title": "Checked", "risk_status": "Low", "explanation": "ok"}]}"#;

    /// Fails any request mentioning "CORRUPT".
    fn model() -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::from_fn(|messages| {
            if messages[0].content.contains("CORRUPT") {
                anyhow::bail!("model returned 500");
            }
            Ok(SUMMARY.to_string())
        }))
    }

    fn runner(model: Arc<ScriptedModel>) -> BatchRunner {
        let pipeline = DocumentPipeline::new(
            &PipelineConfig::default(),
            Arc::new(CharTokenizer),
            model,
            Metrics::new(),
        );
        BatchRunner::new(Arc::new(pipeline), RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_going() {
        let model = model();
        let runner = runner(model.clone());
        let docs = vec![
            AttachedDocument::new("a.txt", "payslip"),
            AttachedDocument::new("b.txt", "CORRUPT scan"),
            AttachedDocument::new("c.txt", "bank statement"),
        ];
        let cache = SummaryCache::new();

        let outcome = runner.run_batch(&docs, &cache, 1, &AbortFlag::new()).await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.results[0].document_id, docs[0].id);
        assert_eq!(outcome.results[1].document_id, docs[2].id);
        assert_eq!(outcome.errors[0].index, 1);
        assert!(outcome.errors[0].to_string().contains("model returned 500"));
        assert!(cache.contains(&docs[2].id));
        assert!(!cache.contains(&docs[1].id));
    }

    #[tokio::test]
    async fn test_width_one_is_sequential() {
        let model = Arc::new(
            ScriptedModel::from_fn(|_| Ok(SUMMARY.to_string())).with_delay(Duration::from_millis(5)),
        );
        let runner = runner(model.clone());
        let docs: Vec<_> = (0..4)
            .map(|i| AttachedDocument::new(format!("{i}.txt"), format!("document {i}")))
            .collect();

        runner.run_batch(&docs, &SummaryCache::new(), 1, &AbortFlag::new()).await;

        assert_eq!(model.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_width_bounds_in_flight_and_keeps_order() {
        let model = Arc::new(
            ScriptedModel::from_fn(|_| Ok(SUMMARY.to_string())).with_delay(Duration::from_millis(5)),
        );
        let runner = runner(model.clone());
        let docs: Vec<_> = (0..6)
            .map(|i| AttachedDocument::new(format!("{i}.txt"), format!("document {i}")))
            .collect();

        let outcome = runner.run_batch(&docs, &SummaryCache::new(), 2, &AbortFlag::new()).await;

        assert!(model.max_in_flight() <= 2);
        let order: Vec<usize> = outcome.results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_abort_before_start_skips_everything() {
        let model = model();
        let runner = runner(model.clone());
        let docs = vec![AttachedDocument::new("a.txt", "x"), AttachedDocument::new("b.txt", "y")];
        let abort = AbortFlag::new();
        abort.abort();

        let outcome = runner.run_batch(&docs, &SummaryCache::new(), 1, &abort).await;

        assert_eq!(model.calls(), 0);
        assert_eq!(outcome.skipped, vec![docs[0].id, docs[1].id]);
    }

    #[tokio::test]
    async fn test_abort_mid_run_lets_current_document_finish() {
        let abort = AbortFlag::new();
        let trigger = abort.clone();
        let model = Arc::new(ScriptedModel::from_fn(move |_| {
            trigger.abort();
            Ok(SUMMARY.to_string())
        }));
        let runner = runner(model.clone());
        let docs = vec![AttachedDocument::new("a.txt", "x"), AttachedDocument::new("b.txt", "y")];

        let outcome = runner.run_batch(&docs, &SummaryCache::new(), 1, &abort).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.skipped, vec![docs[1].id]);
        // chunk call and merge call of the first document
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_rejected() {
        let model = model();
        let runner = runner(model.clone());
        let doc = AttachedDocument::new("a.txt", "x");
        let docs = vec![doc.clone(), doc.clone()];

        let outcome = runner.run_batch(&docs, &SummaryCache::new(), 2, &AbortFlag::new()).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_cached_documents_skip_model() {
        let model = model();
        let runner = runner(model.clone());
        let docs = vec![AttachedDocument::new("a.txt", "x")];
        let cache = SummaryCache::new();
        cache.insert(docs[0].id, DocumentSummary::default());

        let outcome = runner.run_batch(&docs, &cache, 1, &AbortFlag::new()).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_runs_on_spawned_task_with_chunk_fan_out() {
        let model = model();
        let config = PipelineConfig {
            chunk_tokens: 3,
            chunk_concurrency: 4,
            ..PipelineConfig::default()
        };
        let pipeline = DocumentPipeline::new(&config, Arc::new(CharTokenizer), model.clone(), Metrics::new());
        let runner = BatchRunner::new(Arc::new(pipeline), RetryPolicy::none());
        let docs = vec![
            AttachedDocument::new("a.txt", "payslip march"),
            AttachedDocument::new("b.txt", "bank statement"),
        ];
        let cache = SummaryCache::new();

        let handle = tokio::spawn({
            let cache = cache.clone();
            async move { runner.run_batch(&docs, &cache, 2, &AbortFlag::new()).await }
        });
        let outcome = handle.await.unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.errors.is_empty());
        assert_eq!(cache.len(), 2);
    }
}
