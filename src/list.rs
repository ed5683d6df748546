//! Document listing.
//!
//! Shared by `quilt list` and `GET /documents`.

use anyhow::Result;
use serde::Serialize;

use quilt_search_core::models::{format_ts_iso, Document, DocumentId, Metadata};

use crate::config::Config;
use crate::engine::open_engine;

/// Listing entry; embeddings are summarized, not returned.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: String, // ISO8601
    pub has_embedding: bool,
}

impl From<Document> for DocumentSummary {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            has_embedding: doc.has_embedding(),
            created_at: format_ts_iso(doc.created_at),
            content: doc.content,
            metadata: doc.metadata,
        }
    }
}

/// First `max_chars` characters on one line.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

pub async fn run_list(config: &Config, offset: usize, limit: usize) -> Result<()> {
    let engine = open_engine(config).await?;
    let docs = engine.list_documents(offset, limit).await?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in docs.into_iter().map(DocumentSummary::from) {
        let title = doc
            .metadata
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("(untitled)");
        println!("{}. {}", doc.id, title);
        println!("    created: {}", doc.created_at);
        println!("    embedded: {}", if doc.has_embedding { "yes" } else { "no" });
        println!("    excerpt: \"{}\"", excerpt(&doc.content, 120));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("  one\ntwo  ", 20), "one two");
        assert_eq!(excerpt("abcdefghij", 4), "abcd…");
        assert_eq!(excerpt("héllo wörld", 5), "héllo…");
    }
}
