use std::sync::Arc;

use anyhow::{Context, Result};
use assess::{Analyzer, Assistant, CrossDocumentAggregator};
use extract::{ChatModel, OllamaClient};
use ingest::Tokenizer;
use pipeline::{BatchRunner, DocumentPipeline, Metrics, RetryPolicy};
use session::{ClientRoster, KvStore, SessionStore};
use tokio::sync::Mutex;

use crate::config::AppConfig;

/// Client roster plus the selected client's session. Always locked together.
pub struct Workspace {
    pub roster: ClientRoster,
    pub sessions: SessionStore,
}

pub struct AppState {
    pub config: AppConfig,
    pub ollama: OllamaClient,
    pub metrics: Arc<Metrics>,
    pub analyzer: Analyzer,
    pub assistant: Assistant,
    pub workspace: Mutex<Workspace>,
    /// Held for the whole of an analysis run.
    pub analysis_lock: Mutex<()>,
}

impl AppState {
    pub fn build(
        config: AppConfig,
        ollama: OllamaClient,
        model: Arc<dyn ChatModel>,
        tokenizer: Arc<dyn Tokenizer>,
        kv: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let metrics = Metrics::new();
        let pipeline = DocumentPipeline::new(&config.pipeline, tokenizer, model.clone(), metrics.clone());
        let runner = BatchRunner::new(Arc::new(pipeline), RetryPolicy::from(&config.pipeline.retry));
        let analyzer = Analyzer::new(
            runner,
            CrossDocumentAggregator::new(model.clone()),
            config.pipeline.concurrency,
        );

        let roster = ClientRoster::load(kv.clone(), &config.storage.namespace)
            .context("Failed to load client roster")?;
        let mut sessions = SessionStore::new(kv, &config.storage.namespace);
        if let Some(client_id) = roster.active_id() {
            sessions
                .select_client(client_id)
                .with_context(|| format!("Failed to restore session of client {client_id}"))?;
        }

        Ok(Self {
            config,
            ollama,
            metrics,
            analyzer,
            assistant: Assistant::new(model),
            workspace: Mutex::new(Workspace { roster, sessions }),
            analysis_lock: Mutex::new(()),
        })
    }
}
