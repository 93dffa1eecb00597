pub mod aggregator;
pub mod chat;
pub mod metadata;
pub mod run;

pub use aggregator::CrossDocumentAggregator;
pub use chat::Assistant;
pub use metadata::{is_placeholder, ClientMetadata, NOT_SPECIFIED};
pub use run::{failure_finding, AnalysisReport, AnalysisRun, Analyzer, FailedDocument, RunState};
