//! Lexical relevance: TF-IDF over the [`FrequencyIndex`] and a cheap
//! keyword-overlap score.

use serde::Serialize;

use crate::index::FrequencyIndex;
use crate::models::DocumentId;
use crate::tokenize::distinct_tokens;

/// Blend used when no embedding signal is available:
/// `lexical = tfidf × w_t + keyword × w_k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LexicalWeights {
    pub tfidf: f64,
    pub keyword: f64,
}

impl Default for LexicalWeights {
    fn default() -> Self {
        Self {
            tfidf: 0.7,
            keyword: 0.3,
        }
    }
}

/// TF-IDF score of one document for a token list.
///
/// ```text
/// score = Σ_{t ∈ Q, t ∈ doc} (tf[doc][t] / total_terms[doc]) × ln(N / df[t])
/// ```
///
/// Query tokens are taken as given, so a repeated token contributes once per
/// occurrence. Terms with `df == 0` and documents with no terms score 0.
pub fn tfidf_score(index: &FrequencyIndex, doc_id: DocumentId, query_tokens: &[String]) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let total_terms = index.total_terms(doc_id);
    if total_terms == 0 {
        return 0.0;
    }
    let n = index.total_document_count() as f64;

    query_tokens
        .iter()
        .map(|term| {
            let tf = index.term_frequency(doc_id, term);
            let df = index.document_frequency(term);
            if tf == 0 || df == 0 {
                return 0.0;
            }
            (tf as f64 / total_terms as f64) * (n / df as f64).ln()
        })
        .sum()
}

/// Fraction of distinct query tokens found anywhere in the content.
///
/// Containment is a substring test on the lower-cased text, so `"learn"`
/// matches `"learning"`. Not frequency-weighted.
pub fn keyword_score(query_tokens: &[String], content: &str) -> f64 {
    let distinct = distinct_tokens(query_tokens);
    if distinct.is_empty() {
        return 0.0;
    }
    let haystack = content.to_lowercase();
    let matches = distinct.iter().filter(|t| haystack.contains(*t)).count();
    matches as f64 / distinct.len() as f64
}

/// Standalone lexical score: `w_t × tfidf + w_k × keyword`.
pub fn lexical_score(tfidf: f64, keyword: f64, weights: &LexicalWeights) -> f64 {
    weights.tfidf * tfidf + weights.keyword * keyword
}
