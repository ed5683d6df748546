//! Term and document frequency bookkeeping for TF-IDF scoring.
//!
//! The index is derived state: it can always be rebuilt from a full scan of
//! the document store. Callers are responsible for serializing writers;
//! the index itself does no locking.
//!
//! # Invariant
//!
//! ```text
//! document_frequency[t] == |{ d : term_frequency[d][t] > 0 }|
//! ```

use std::collections::HashMap;

use crate::models::DocumentId;
use crate::tokenize::tokenize;

#[derive(Debug, Clone, Default)]
struct DocTerms {
    counts: HashMap<String, u32>,
    total: u32,
}

/// Per-document term counts plus global document frequencies.
#[derive(Debug, Clone, Default)]
pub struct FrequencyIndex {
    docs: HashMap<DocumentId, DocTerms>,
    document_frequency: HashMap<String, u32>,
}

impl FrequencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `(id, content)` pairs.
    pub fn rebuild<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (DocumentId, &'a str)>,
    {
        let mut index = Self::new();
        for (id, content) in documents {
            index.update(id, content);
        }
        index
    }

    /// Record a document's terms.
    ///
    /// Each distinct term bumps its document frequency once, regardless of
    /// how often it occurs. Re-indexing an id retracts its previous
    /// contribution first.
    pub fn update(&mut self, doc_id: DocumentId, content: &str) {
        self.remove(doc_id);

        let tokens = tokenize(content);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in tokens.iter() {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }

        for term in counts.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }

        self.docs.insert(
            doc_id,
            DocTerms {
                counts,
                total: tokens.len() as u32,
            },
        );
    }

    fn remove(&mut self, doc_id: DocumentId) {
        let Some(previous) = self.docs.remove(&doc_id) else {
            return;
        };
        for term in previous.counts.keys() {
            if let Some(df) = self.document_frequency.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.document_frequency.remove(term);
                }
            }
        }
    }

    pub fn term_frequency(&self, doc_id: DocumentId, term: &str) -> u32 {
        self.docs
            .get(&doc_id)
            .and_then(|d| d.counts.get(term))
            .copied()
            .unwrap_or(0)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    /// Number of tokens in the document (after filtering).
    pub fn total_terms(&self, doc_id: DocumentId) -> u32 {
        self.docs.get(&doc_id).map(|d| d.total).unwrap_or(0)
    }

    /// `N` in the IDF formula.
    pub fn total_document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn unique_term_count(&self) -> usize {
        self.document_frequency.len()
    }

    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.docs.contains_key(&doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_df_invariant(index: &FrequencyIndex) {
        for (term, df) in &index.document_frequency {
            let holders = index
                .docs
                .values()
                .filter(|d| d.counts.get(term).copied().unwrap_or(0) > 0)
                .count();
            assert_eq!(*df as usize, holders, "df mismatch for '{}'", term);
        }
    }

    #[test]
    fn test_counts_occurrences_per_document() {
        let mut index = FrequencyIndex::new();
        index.update(1, "rust rust rust tokio");
        assert_eq!(index.term_frequency(1, "rust"), 3);
        assert_eq!(index.term_frequency(1, "tokio"), 1);
        assert_eq!(index.total_terms(1), 4);
    }

    #[test]
    fn test_document_frequency_counts_documents_not_occurrences() {
        let mut index = FrequencyIndex::new();
        index.update(1, "rust rust rust");
        index.update(2, "rust and python");
        assert_eq!(index.document_frequency("rust"), 2);
        assert_eq!(index.document_frequency("python"), 1);
        assert_eq!(index.document_frequency("missing"), 0);
        assert_eq!(index.total_document_count(), 2);
        assert_df_invariant(&index);
    }

    #[test]
    fn test_same_content_twice_counts_twice() {
        let mut index = FrequencyIndex::new();
        index.update(1, "Machine learning basics");
        index.update(2, "Machine learning basics");
        assert_eq!(index.document_frequency("machine"), 2);
        assert_eq!(index.document_frequency("learning"), 2);
    }

    #[test]
    fn test_reindex_same_id_retracts_previous() {
        let mut index = FrequencyIndex::new();
        index.update(7, "alpha beta");
        index.update(7, "beta gamma");
        assert_eq!(index.document_frequency("alpha"), 0);
        assert_eq!(index.document_frequency("beta"), 1);
        assert_eq!(index.document_frequency("gamma"), 1);
        assert_eq!(index.total_document_count(), 1);
        assert_eq!(index.unique_term_count(), 2);
        assert_df_invariant(&index);
    }

    #[test]
    fn test_empty_document_still_counts_toward_n() {
        let mut index = FrequencyIndex::new();
        index.update(1, "a b c 1 2 3");
        assert!(index.contains(1));
        assert_eq!(index.total_terms(1), 0);
        assert_eq!(index.total_document_count(), 1);
        assert_eq!(index.unique_term_count(), 0);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let docs = vec![
            (1, "hybrid search engine"),
            (2, "keyword search fallback"),
            (3, "vector similarity engine"),
        ];
        let rebuilt = FrequencyIndex::rebuild(docs.iter().map(|(id, c)| (*id, *c)));

        let mut incremental = FrequencyIndex::new();
        for (id, content) in &docs {
            incremental.update(*id, content);
        }

        for term in ["hybrid", "search", "engine", "keyword", "vector"] {
            assert_eq!(
                rebuilt.document_frequency(term),
                incremental.document_frequency(term)
            );
        }
        assert_eq!(rebuilt.unique_term_count(), incremental.unique_term_count());
        assert_df_invariant(&rebuilt);
    }
}
