use std::path::PathBuf;

use anyhow::{Context, Result};
use pipeline::{PipelineConfig, RetryConfig};
use serde::{Deserialize, Serialize};

/// Built once at startup and handed to every constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,     // small local model, quick answers
    Accurate, // larger model, slower
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub ollama_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::fast_mode()
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        Self {
            mode: OperationMode::Fast,
            model: ModelConfig {
                ollama_url: "http://localhost:11434".to_string(),
                model: "gemma3:1b".to_string(),
                request_timeout_secs: 120,
            },
            pipeline: PipelineConfig::default(),
            storage: StorageConfig {
                data_dir: PathBuf::from("data/sessions"),
                namespace: session::DEFAULT_NAMESPACE.to_string(),
            },
            server: ServerConfig {
                bind: "0.0.0.0:3000".to_string(),
            },
        }
    }

    pub fn accurate_mode() -> Self {
        let mut config = Self::fast_mode();
        config.mode = OperationMode::Accurate;
        config.model.model = "gpt-oss:20b".to_string();
        config.model.request_timeout_secs = 600;
        config.pipeline.retry = RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 2000,
            max_backoff_ms: 20000,
        };
        config
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `MORTGAGE_CHECK_*` overrides on top of the selected mode.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("MORTGAGE_CHECK_MODE").as_deref() {
            None | Some("fast") => Self::fast_mode(),
            Some("accurate") => Self::accurate_mode(),
            Some(other) => anyhow::bail!("MORTGAGE_CHECK_MODE must be 'fast' or 'accurate', got '{other}'"),
        };

        if let Some(model) = lookup("MORTGAGE_CHECK_MODEL") {
            config.model.model = model;
        }
        if let Some(url) = lookup("MORTGAGE_CHECK_OLLAMA_URL") {
            config.model.ollama_url = url.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("MORTGAGE_CHECK_CONCURRENCY") {
            config.pipeline.concurrency = parse_positive("MORTGAGE_CHECK_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("MORTGAGE_CHECK_CHUNK_TOKENS") {
            config.pipeline.chunk_tokens = parse_positive("MORTGAGE_CHECK_CHUNK_TOKENS", &value)?;
        }
        if let Some(dir) = lookup("MORTGAGE_CHECK_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(bind) = lookup("MORTGAGE_CHECK_BIND") {
            config.server.bind = bind;
        }

        Ok(config)
    }
}

fn parse_positive(name: &str, value: &str) -> Result<usize> {
    let parsed: usize = value
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a positive integer, got '{value}'"))?;
    if parsed == 0 {
        anyhow::bail!("{name} must be at least 1");
    }
    Ok(parsed)
}
