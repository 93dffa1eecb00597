use serde::{Deserialize, Serialize};

use crate::document::DocumentId;

/// One token-bounded slice of a document, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: DocumentId,
    pub index: usize,
    pub text: String,
    pub token_count: usize,
}

impl Chunk {
    pub fn new(doc_id: DocumentId, index: usize, text: String, token_count: usize) -> Self {
        Self {
            doc_id,
            index,
            text,
            token_count,
        }
    }
}
