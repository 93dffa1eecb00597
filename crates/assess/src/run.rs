use extract::{RiskFinding, RiskStatus};
use ingest::AttachedDocument;
use pipeline::{AbortFlag, BatchRunner, SummaryCache};
use serde::Serialize;

use crate::aggregator::CrossDocumentAggregator;
use crate::metadata::ClientMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// One analysis invocation over the active working set. Never persisted.
#[derive(Debug)]
pub struct AnalysisRun {
    active_documents: Vec<AttachedDocument>,
    state: RunState,
    abort: AbortFlag,
}

impl AnalysisRun {
    /// Keeps only the documents flagged active.
    pub fn new(documents: &[AttachedDocument]) -> Self {
        Self {
            active_documents: documents.iter().filter(|d| d.is_active).cloned().collect(),
            state: RunState::Idle,
            abort: AbortFlag::new(),
        }
    }

    pub fn active_documents(&self) -> &[AttachedDocument] {
        &self.active_documents
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Handle for stopping the run before its next document starts.
    pub fn abort_handle(&self) -> AbortFlag {
        self.abort.clone()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub state: RunState,
    pub findings: Vec<RiskFinding>,
    pub documents_analyzed: usize,
    pub failed_documents: Vec<FailedDocument>,
    pub skipped_documents: usize,
}

pub struct Analyzer {
    runner: BatchRunner,
    aggregator: CrossDocumentAggregator,
    concurrency: usize,
}

impl Analyzer {
    pub fn new(runner: BatchRunner, aggregator: CrossDocumentAggregator, concurrency: usize) -> Self {
        Self {
            runner,
            aggregator,
            concurrency,
        }
    }

    /// Summarize every active document, then aggregate what succeeded.
    ///
    /// The report always carries at least one finding: an outright failure
    /// becomes a single "Insufficient Information" finding.
    pub async fn run(
        &self,
        run: &mut AnalysisRun,
        cache: &SummaryCache,
        metadata: &ClientMetadata,
    ) -> AnalysisReport {
        run.state = RunState::Running;
        tracing::info!(documents = run.active_documents.len(), "Starting analysis run");

        let outcome = self
            .runner
            .run_batch(&run.active_documents, cache, self.concurrency, &run.abort)
            .await;

        let failed_documents: Vec<FailedDocument> = outcome
            .errors
            .iter()
            .map(|e| FailedDocument {
                name: e.name.clone(),
                error: format!("{:#}", e.error),
            })
            .collect();

        let mut report = AnalysisReport {
            state: RunState::Failed,
            findings: Vec::new(),
            documents_analyzed: outcome.results.len(),
            failed_documents,
            skipped_documents: outcome.skipped.len(),
        };

        if !outcome.skipped.is_empty() {
            report.findings = vec![failure_finding("The analysis was stopped before it finished.")];
            run.state = RunState::Failed;
            report.state = run.state;
            return report;
        }

        if !run.active_documents.is_empty() && outcome.results.is_empty() {
            let message = format!(
                "None of the {} active documents could be analyzed.",
                run.active_documents.len()
            );
            report.findings = vec![failure_finding(&message)];
            run.state = RunState::Failed;
            report.state = run.state;
            return report;
        }

        match self.aggregator.aggregate(&outcome.summaries(), metadata).await {
            Ok(findings) => {
                report.findings = findings;
                run.state = RunState::Succeeded;
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Analysis run failed");
                report.findings = vec![failure_finding(&format!("{e:#}"))];
                run.state = RunState::Failed;
            }
        }

        report.state = run.state;
        tracing::info!(
            state = ?report.state,
            findings = report.findings.len(),
            failed = report.failed_documents.len(),
            "Analysis run finished"
        );
        report
    }
}

/// What the analysis surface shows when a run could not produce findings.
pub fn failure_finding(reason: &str) -> RiskFinding {
    RiskFinding::new(
        "Analysis Failed",
        RiskStatus::InsufficientInformation,
        format!("Unable to complete risk analysis: {reason}"),
    )
}
