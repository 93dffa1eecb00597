mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use extract::OllamaClient;
use ingest::Cl100kTokenizer;
use session::FileStore;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        mode = ?config.mode,
        model = %config.model.model,
        concurrency = config.pipeline.concurrency,
        chunk_tokens = config.pipeline.chunk_tokens,
        "Loaded configuration"
    );

    let store = FileStore::open(&config.storage.data_dir).with_context(|| {
        format!("Failed to open data directory {:?}", config.storage.data_dir)
    })?;

    let ollama = OllamaClient::with_timeout(
        config.model.ollama_url.clone(),
        config.model.model.clone(),
        Duration::from_secs(config.model.request_timeout_secs),
    )?;
    let tokenizer = Cl100kTokenizer::new()?;

    let bind = config.server.bind.clone();
    let state = AppState::build(
        config,
        ollama.clone(),
        Arc::new(ollama),
        Arc::new(tokenizer),
        Arc::new(store),
    )?;
    let app = routes::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    tracing::info!("Server listening on http://{}", bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// `RUST_LOG` filter, `info` by default; JSON lines when
/// `MORTGAGE_CHECK_LOG_JSON=1`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("MORTGAGE_CHECK_LOG_JSON").is_ok_and(|v| v == "1");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
