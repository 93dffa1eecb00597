use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use extract::DocumentSummary;
use ingest::DocumentId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Side-table of computed document summaries, keyed by document identity.
///
/// Clones share the same table. An entry is only removed together with its
/// document; edits to a document's text under the same id are not detected.
#[derive(Clone, Default)]
pub struct SummaryCache {
    summaries: Arc<DashMap<DocumentId, DocumentSummary>>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DocumentId) -> Option<DocumentSummary> {
        self.summaries.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, id: DocumentId, summary: DocumentSummary) {
        self.summaries.insert(id, summary);
    }

    pub fn remove(&self, id: &DocumentId) -> Option<DocumentSummary> {
        self.summaries.remove(id).map(|(_, summary)| summary)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.summaries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Ordered copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<DocumentId, DocumentSummary> {
        self.summaries
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect()
    }

    /// Independent copy; inserts into either side are not seen by the other.
    pub fn detached(&self) -> Self {
        self.snapshot().into_iter().collect()
    }

    pub fn clear(&self) {
        self.summaries.clear();
    }
}

impl FromIterator<(DocumentId, DocumentSummary)> for SummaryCache {
    fn from_iter<I: IntoIterator<Item = (DocumentId, DocumentSummary)>>(iter: I) -> Self {
        Self {
            summaries: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl PartialEq for SummaryCache {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl std::fmt::Debug for SummaryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

impl Serialize for SummaryCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SummaryCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<DocumentId, DocumentSummary>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
