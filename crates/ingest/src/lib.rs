pub mod chunk;
pub mod chunker;
pub mod document;
pub mod reader;
pub mod tokenizer;

pub use chunk::Chunk;
pub use chunker::{chunk, Chunker, ChunkerConfig};
pub use document::{AttachedDocument, DocumentId};
pub use reader::{ExtractionError, FileReader};
pub use tokenizer::{Cl100kTokenizer, Tokenizer};

use std::path::Path;

/// Upload path: extract the text of a file and wrap it as a new active document.
///
/// Extraction failures are returned to the caller and nothing is attached.
pub async fn attach_file(file_path: &Path) -> Result<AttachedDocument, ExtractionError> {
    let raw_text = FileReader::read_file(file_path).await?;
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string_lossy().to_string());

    tracing::info!(name = %name, bytes = raw_text.len(), "Attached document");
    Ok(AttachedDocument::new(name, raw_text))
}
