use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to read file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to extract PDF text from {path:?}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("No text could be extracted from {0:?}")]
    Empty(PathBuf),
}

pub struct FileReader;

impl FileReader {
    /// Extract plain text from a supported document.
    pub async fn read_file(path: &Path) -> Result<String, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let content = match extension.as_str() {
            "txt" | "md" => fs::read_to_string(path)
                .await
                .map_err(|source| ExtractionError::Io {
                    path: path.to_path_buf(),
                    source,
                })?,
            "pdf" => Self::read_pdf(path).await?,
            _ => return Err(ExtractionError::UnsupportedFormat(extension)),
        };

        if content.trim().is_empty() {
            return Err(ExtractionError::Empty(path.to_path_buf()));
        }

        Ok(content)
    }

    async fn read_pdf(path: &Path) -> Result<String, ExtractionError> {
        let owned = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;

        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractionError::Pdf {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) => Err(ExtractionError::Pdf {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Salary £52,000").unwrap();

        let text = FileReader::read_file(&path).await.unwrap();
        assert_eq!(text, "Salary £52,000");
    }

    #[tokio::test]
    async fn test_rejects_unknown_extension() {
        let err = FileReader::read_file(Path::new("scan.docx")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(ext) if ext == "docx"));
    }

    #[tokio::test]
    async fn test_whitespace_only_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.md");
        std::fs::write(&path, "  \n\n ").unwrap();

        let err = FileReader::read_file(&path).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Empty(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = FileReader::read_file(Path::new("/nonexistent/bank.txt")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Io { .. }));
    }
}
