//! Core data models shared by the store, the index, and the ranker.

use serde::Serialize;

/// Store-assigned document identifier. Stable and never reused.
pub type DocumentId = i64;

/// Open key-value metadata carried through to search results untouched.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored document.
///
/// Documents are immutable once inserted. `embedding` is present only if the
/// embedding provider succeeded at insert time; documents without one take
/// part in lexical scoring only.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub metadata: Metadata,
    /// Unix timestamp (seconds) set once on insert.
    pub created_at: i64,
}

impl Document {
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// A document that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Metadata,
    pub created_at: i64,
}

impl NewDocument {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            embedding: None,
            metadata,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_embedding(mut self, embedding: Option<Vec<f32>>) -> Self {
        self.embedding = embedding;
        self
    }
}

/// Format a Unix timestamp as ISO 8601.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
