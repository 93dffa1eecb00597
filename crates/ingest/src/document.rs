use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of an uploaded document. Cached summaries are keyed by it,
/// never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDocument {
    pub id: DocumentId,
    pub name: String,
    pub raw_text: String,
    /// Member of the working set considered by the next analysis run.
    pub is_active: bool,
}

impl AttachedDocument {
    /// A freshly uploaded document: new identity, active by default.
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            raw_text: raw_text.into(),
            is_active: true,
        }
    }
}
