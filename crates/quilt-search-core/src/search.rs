//! Ranking passes: hybrid, lexical fallback, pure vector, and keyword.
//!
//! Every pass is a pure function over a corpus snapshot and a
//! [`FrequencyIndex`] snapshot. The calling application is responsible for
//! obtaining a consistent snapshot, embedding the query, and choosing the
//! pass (see the `SearchEngine` in the `quilt-search` crate).
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Tokenize the query (done by the caller).
//! 2. For each document: `vector = max(0, cos(q, d))` if it has an
//!    embedding, else `0`; `tfidf` and `keyword` from [`crate::lexical`].
//! 3. Merge: `score = w_v × vector + w_t × tfidf + w_k × keyword`.
//! 4. Drop `score <= threshold`.
//! 5. Stable sort by score (desc); ties keep insertion order.
//! 6. Truncate to `k`.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::vector_score;
use crate::index::FrequencyIndex;
use crate::lexical::{keyword_score, lexical_score, tfidf_score, LexicalWeights};
use crate::models::{format_ts_iso, Document, DocumentId, Metadata};

/// Which scoring pass produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringPath {
    PureVector,
    Hybrid,
    LexicalFallback,
    Keyword,
}

impl ScoringPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PureVector => "pure-vector",
            Self::Hybrid => "hybrid",
            Self::LexicalFallback => "lexical-fallback",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for ScoringPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested search entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Vector,
    Keyword,
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hybrid" => Ok(Self::Hybrid),
            "vector" | "semantic" => Ok(Self::Vector),
            "keyword" => Ok(Self::Keyword),
            other => bail!(
                "Unknown search mode: {}. Use hybrid, vector, or keyword.",
                other
            ),
        }
    }
}

/// Blend used when a query embedding is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HybridWeights {
    pub vector: f64,
    pub tfidf: f64,
    pub keyword: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            vector: 0.6,
            tfidf: 0.25,
            keyword: 0.15,
        }
    }
}

/// Minimum scores; a result must score strictly above its pass threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub hybrid: f64,
    pub vector: f64,
    pub lexical: f64,
    pub keyword: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hybrid: 0.1,
            vector: 0.1,
            lexical: 0.0,
            keyword: 0.0,
        }
    }
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchParams {
    pub weights: HybridWeights,
    pub lexical: LexicalWeights,
    pub thresholds: Thresholds,
    /// Result count used when the caller gives none.
    pub default_limit: usize,
    /// Upper bound on `k`.
    pub max_limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            weights: HybridWeights::default(),
            lexical: LexicalWeights::default(),
            thresholds: Thresholds::default(),
            default_limit: 5,
            max_limit: 20,
        }
    }
}

const WEIGHT_EPSILON: f64 = 1e-6;

impl SearchParams {
    /// Check weight ranges, sums, and vector dominance.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (name, value) in [
            ("vector_weight", w.vector),
            ("tfidf_weight", w.tfidf),
            ("keyword_weight", w.keyword),
            ("lexical_tfidf_weight", self.lexical.tfidf),
            ("lexical_keyword_weight", self.lexical.keyword),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("retrieval.{} must be in [0.0, 1.0], got {}", name, value);
            }
        }

        let hybrid_sum = w.vector + w.tfidf + w.keyword;
        if (hybrid_sum - 1.0).abs() > WEIGHT_EPSILON {
            bail!(
                "retrieval hybrid weights must sum to 1.0, got {:.4}",
                hybrid_sum
            );
        }
        if w.vector <= w.tfidf || w.vector <= w.keyword {
            bail!("retrieval.vector_weight must be greater than tfidf_weight and keyword_weight");
        }

        let lexical_sum = self.lexical.tfidf + self.lexical.keyword;
        if (lexical_sum - 1.0).abs() > WEIGHT_EPSILON {
            bail!(
                "retrieval lexical weights must sum to 1.0, got {:.4}",
                lexical_sum
            );
        }

        if self.default_limit == 0 || self.max_limit == 0 {
            bail!("retrieval.default_limit and retrieval.max_limit must be >= 1");
        }
        if self.default_limit > self.max_limit {
            bail!("retrieval.default_limit must not exceed retrieval.max_limit");
        }
        Ok(())
    }

    /// Normalize a requested result count into `1..=max_limit`.
    pub fn clamp_limit(&self, k: Option<i64>) -> usize {
        match k {
            None => self.default_limit,
            Some(k) if k <= 0 => 1,
            Some(k) => (k as u64).min(self.max_limit as u64) as usize,
        }
    }
}

/// Component scores behind a result.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub vector: f64,
    pub tfidf: f64,
    pub keyword: f64,
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    pub id: DocumentId,
    pub content: String,
    pub score: f64,
    pub metadata: Metadata,
    /// Insertion timestamp (ISO 8601).
    pub created_at: String,
    pub path: ScoringPath,
    /// Scoring breakdown (populated when explain is requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreBreakdown>,
}

/// Result list plus the pass that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub path: ScoringPath,
    pub results: Vec<SearchResultItem>,
    /// `true` when the corpus could not be fetched; results are then empty.
    pub store_unavailable: bool,
}

impl SearchResponse {
    pub fn empty(path: ScoringPath) -> Self {
        Self {
            path,
            results: Vec::new(),
            store_unavailable: false,
        }
    }

    pub fn store_unavailable(path: ScoringPath) -> Self {
        Self {
            path,
            results: Vec::new(),
            store_unavailable: true,
        }
    }
}

/// Snapshot and options shared by every pass.
pub struct RankContext<'a> {
    pub documents: &'a [Document],
    pub index: &'a FrequencyIndex,
    pub params: &'a SearchParams,
    /// Already clamped result count.
    pub k: usize,
    pub explain: bool,
}

struct Scored<'a> {
    doc: &'a Document,
    score: f64,
    breakdown: ScoreBreakdown,
}

fn doc_vector_score(query_vec: &[f32], doc: &Document) -> f64 {
    doc.embedding
        .as_deref()
        .map(|e| vector_score(query_vec, e))
        .unwrap_or(0.0)
}

/// Blend vector, TF-IDF, and keyword signals for every document.
///
/// Documents without a stored embedding contribute `0` to the vector term.
/// With an empty token list only the vector term contributes.
pub fn rank_hybrid(
    ctx: &RankContext<'_>,
    query_tokens: &[String],
    query_vec: &[f32],
) -> Vec<SearchResultItem> {
    let w = &ctx.params.weights;
    let scored = ctx
        .documents
        .iter()
        .map(|doc| {
            let breakdown = ScoreBreakdown {
                vector: doc_vector_score(query_vec, doc),
                tfidf: tfidf_score(ctx.index, doc.id, query_tokens),
                keyword: keyword_score(query_tokens, &doc.content),
            };
            let score = w.vector * breakdown.vector
                + w.tfidf * breakdown.tfidf
                + w.keyword * breakdown.keyword;
            Scored {
                doc,
                score,
                breakdown,
            }
        })
        .collect();
    finalize(ctx, scored, ctx.params.thresholds.hybrid, ScoringPath::Hybrid)
}

/// TF-IDF + keyword blend; used whenever no usable query embedding exists.
///
/// Stored embeddings are ignored in this mode.
pub fn rank_lexical(ctx: &RankContext<'_>, query_tokens: &[String]) -> Vec<SearchResultItem> {
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let scored = ctx
        .documents
        .iter()
        .map(|doc| {
            let breakdown = ScoreBreakdown {
                vector: 0.0,
                tfidf: tfidf_score(ctx.index, doc.id, query_tokens),
                keyword: keyword_score(query_tokens, &doc.content),
            };
            let score = lexical_score(breakdown.tfidf, breakdown.keyword, &ctx.params.lexical);
            Scored {
                doc,
                score,
                breakdown,
            }
        })
        .collect();
    finalize(
        ctx,
        scored,
        ctx.params.thresholds.lexical,
        ScoringPath::LexicalFallback,
    )
}

/// Cosine similarity only; documents without an embedding are skipped.
pub fn rank_vector(ctx: &RankContext<'_>, query_vec: &[f32]) -> Vec<SearchResultItem> {
    let scored = ctx
        .documents
        .iter()
        .filter(|doc| doc.has_embedding())
        .map(|doc| {
            let vector = doc_vector_score(query_vec, doc);
            Scored {
                doc,
                score: vector,
                breakdown: ScoreBreakdown {
                    vector,
                    ..Default::default()
                },
            }
        })
        .collect();
    finalize(
        ctx,
        scored,
        ctx.params.thresholds.vector,
        ScoringPath::PureVector,
    )
}

/// Keyword overlap only.
pub fn rank_keyword(ctx: &RankContext<'_>, query_tokens: &[String]) -> Vec<SearchResultItem> {
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let scored = ctx
        .documents
        .iter()
        .map(|doc| {
            let keyword = keyword_score(query_tokens, &doc.content);
            Scored {
                doc,
                score: keyword,
                breakdown: ScoreBreakdown {
                    keyword,
                    ..Default::default()
                },
            }
        })
        .collect();
    finalize(
        ctx,
        scored,
        ctx.params.thresholds.keyword,
        ScoringPath::Keyword,
    )
}

/// Threshold, stable sort, truncate, and materialize results.
fn finalize(
    ctx: &RankContext<'_>,
    mut scored: Vec<Scored<'_>>,
    threshold: f64,
    path: ScoringPath,
) -> Vec<SearchResultItem> {
    // NaN fails the comparison and is dropped with the noise.
    scored.retain(|s| s.score > threshold);

    // `sort_by` is stable: equal scores keep corpus (insertion) order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(ctx.k);

    scored
        .into_iter()
        .map(|s| SearchResultItem {
            id: s.doc.id,
            content: s.doc.content.clone(),
            score: s.score,
            metadata: s.doc.metadata.clone(),
            created_at: format_ts_iso(s.doc.created_at),
            path,
            explain: ctx.explain.then_some(s.breakdown),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::tokenize;

    fn doc(id: DocumentId, content: &str, embedding: Option<Vec<f32>>) -> Document {
        Document {
            id,
            content: content.to_string(),
            embedding,
            metadata: Metadata::new(),
            created_at: 1_700_000_000 + id,
        }
    }

    fn index_for(docs: &[Document]) -> FrequencyIndex {
        FrequencyIndex::rebuild(docs.iter().map(|d| (d.id, d.content.as_str())))
    }

    fn ml_corpus() -> Vec<Document> {
        vec![
            doc(
                0,
                "Machine learning is a subset of artificial intelligence.",
                None,
            ),
            doc(1, "Python is a programming language.", None),
        ]
    }

    #[test]
    fn test_lexical_scenario_ml_document_first() {
        let docs = ml_corpus();
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 2,
            explain: false,
        };
        let results = rank_lexical(&ctx, &tokenize("machine learning"));
        assert!(!results.is_empty());
        assert_eq!(results[0].id, 0);
        assert_eq!(results[0].path, ScoringPath::LexicalFallback);
        // The Python document shares no terms and is filtered out.
        assert_eq!(results.len(), 1);
        let expected = 0.7 * (2.0 * 0.2 * 2f64.ln()) + 0.3 * 1.0;
        assert!((results[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_lexical_empty_tokens_is_empty() {
        let docs = ml_corpus();
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 5,
            explain: false,
        };
        assert!(rank_lexical(&ctx, &tokenize("   ")).is_empty());
        assert!(rank_keyword(&ctx, &[]).is_empty());
    }

    #[test]
    fn test_empty_corpus() {
        let docs: Vec<Document> = Vec::new();
        let index = FrequencyIndex::new();
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 5,
            explain: false,
        };
        assert!(rank_lexical(&ctx, &tokenize("anything")).is_empty());
        assert!(rank_hybrid(&ctx, &tokenize("anything"), &[1.0, 0.0]).is_empty());
        assert!(rank_vector(&ctx, &[1.0, 0.0]).is_empty());
    }

    #[test]
    fn test_hybrid_vector_contributes_with_no_tokens() {
        let docs = vec![
            doc(1, "aligned", Some(vec![1.0, 0.0])),
            doc(2, "orthogonal", Some(vec![0.0, 1.0])),
        ];
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 5,
            explain: true,
        };
        let results = rank_hybrid(&ctx, &[], &[1.0, 0.0]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 0.6).abs() < 1e-9);
        let breakdown = results[0].explain.unwrap();
        assert_eq!(breakdown.tfidf, 0.0);
        assert_eq!(breakdown.keyword, 0.0);
    }

    #[test]
    fn test_hybrid_ignores_anti_correlated_vectors() {
        let docs = vec![doc(1, "opposite", Some(vec![-1.0, 0.0]))];
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 5,
            explain: true,
        };
        assert!(rank_hybrid(&ctx, &[], &[1.0, 0.0]).is_empty());
    }

    #[test]
    fn test_hybrid_scores_documents_without_embeddings_lexically() {
        let docs = vec![
            doc(1, "rust ownership and borrowing rules", None),
            doc(2, "gardening tips", Some(vec![0.0, 1.0])),
        ];
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 5,
            explain: true,
        };
        let results = rank_hybrid(&ctx, &tokenize("rust borrowing"), &[1.0, 0.0]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[0].explain.unwrap().vector, 0.0);
        assert_eq!(results[0].path, ScoringPath::Hybrid);
    }

    #[test]
    fn test_vector_skips_documents_without_embedding() {
        let docs = vec![
            doc(1, "no vector", None),
            doc(2, "close", Some(vec![0.9, 0.1])),
            doc(3, "exact", Some(vec![1.0, 0.0])),
        ];
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 5,
            explain: false,
        };
        let results = rank_vector(&ctx, &[1.0, 0.0]);
        let ids: Vec<_> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(results.iter().all(|r| r.path == ScoringPath::PureVector));
    }

    #[test]
    fn test_threshold_sort_and_top_k() {
        let docs: Vec<Document> = (1..=8)
            .map(|i| {
                let angle = i as f32 * 0.15;
                doc(i, "doc", Some(vec![angle.cos(), angle.sin()]))
            })
            .collect();
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 3,
            explain: false,
        };
        let results = rank_vector(&ctx, &[1.0, 0.0]);
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| r.score > params.thresholds.vector));
    }

    #[test]
    fn test_fewer_than_k_returns_all() {
        let docs = ml_corpus();
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 10,
            explain: false,
        };
        let results = rank_keyword(&ctx, &tokenize("language intelligence"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let docs = vec![
            doc(5, "shared words here", None),
            doc(2, "shared words here", None),
            doc(9, "shared words here", None),
        ];
        let index = index_for(&docs);
        let params = SearchParams::default();
        let ctx = RankContext {
            documents: &docs,
            index: &index,
            params: &params,
            k: 3,
            explain: false,
        };
        let ids: Vec<_> = rank_keyword(&ctx, &tokenize("shared"))
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![5, 2, 9]);
    }

    #[test]
    fn test_clamp_limit() {
        let params = SearchParams::default();
        assert_eq!(params.clamp_limit(None), 5);
        assert_eq!(params.clamp_limit(Some(0)), 1);
        assert_eq!(params.clamp_limit(Some(-4)), 1);
        assert_eq!(params.clamp_limit(Some(7)), 7);
        assert_eq!(params.clamp_limit(Some(500)), 20);
    }

    #[test]
    fn test_validate_defaults() {
        SearchParams::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_non_dominant_vector() {
        let mut params = SearchParams::default();
        params.weights = HybridWeights {
            vector: 0.3,
            tfidf: 0.4,
            keyword: 0.3,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_sum() {
        let mut params = SearchParams::default();
        params.weights.vector = 0.9;
        assert!(params.validate().is_err());
        let mut params = SearchParams::default();
        params.lexical.keyword = 0.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("semantic".parse::<SearchMode>().unwrap(), SearchMode::Vector);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_path_serializes_kebab_case() {
        let json = serde_json::to_string(&ScoringPath::LexicalFallback).unwrap();
        assert_eq!(json, "\"lexical-fallback\"");
        assert_eq!(ScoringPath::PureVector.to_string(), "pure-vector");
    }
}
