use ingest::DocumentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage failure for key '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Persisted record '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize record '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("No client is selected")]
    NoActiveClient,
    #[error("Unknown client: {0}")]
    UnknownClient(String),
    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),
    #[error("Client name must not be empty")]
    EmptyClientName,
}

pub type Result<T> = std::result::Result<T, SessionError>;
