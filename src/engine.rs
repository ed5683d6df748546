//! The search engine service.
//!
//! [`SearchEngine`] owns the document store, the embedding provider, and the
//! in-memory frequency index, and decides which ranking pass answers each
//! query.
//!
//! # Concurrency
//!
//! The index lives behind a `tokio::sync::RwLock`:
//!
//! - searches take the read lock for the store fetch and the scoring pass,
//!   so each call scores against one consistent snapshot;
//! - `add_document` takes the write lock around the store insert and the
//!   index update, so no search observes one without the other. The insert
//!   is bounded by the fetch timeout, so a hung store cannot hold the lock.
//!
//! Embedding calls (query and document) happen before any lock is taken.
//!
//! # Out-of-band writes
//!
//! Another process may insert into the same store (`quilt add` while
//! `quilt serve` runs). Searches and [`SearchEngine::stats`] compare the
//! store against the index and rebuild it under the write lock when they
//! disagree.
//!
//! # Degradation
//!
//! | Condition | Result |
//! |-----------|--------|
//! | provider disabled, failing, or timed out | `lexical-fallback` pass |
//! | query vector dims differ from corpus dims | `lexical-fallback` pass |
//! | store fetch fails or times out | empty results, `store_unavailable = true` |
//! | blank query | empty results |

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard};

use quilt_search_core::embedding::EmbeddingProvider;
use quilt_search_core::error::{IngestError, StoreError};
use quilt_search_core::index::FrequencyIndex;
use quilt_search_core::models::{Document, DocumentId, Metadata, NewDocument};
use quilt_search_core::search::{
    rank_hybrid, rank_keyword, rank_lexical, rank_vector, RankContext, ScoringPath, SearchMode,
    SearchParams, SearchResponse,
};
use quilt_search_core::store::DocumentStore;
use quilt_search_core::tokenize::tokenize;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;
use crate::{db, embedding, migrate};

/// Tuning knobs for a [`SearchEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub params: SearchParams,
    /// Bound on every embedding call.
    pub embed_timeout: Duration,
    /// Bound on every full-corpus fetch.
    pub fetch_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            params: SearchParams::default(),
            embed_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            params: config.retrieval.search_params(),
            embed_timeout: config.embedding.timeout(),
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

/// Corpus summary reported by `quilt stats` and `GET /stats`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub document_count: usize,
    pub indexed_with_embedding_count: usize,
    /// Documents known to the frequency index; differs from
    /// `document_count` only when another process wrote to the store.
    pub indexed_document_count: usize,
    pub unique_term_count: usize,
    pub embedding_model: String,
    pub embedding_dims: Option<usize>,
}

struct IndexState {
    index: FrequencyIndex,
    /// Dimensionality of the first stored embedding; every later one must match.
    dims: Option<usize>,
}

impl IndexState {
    fn from_documents(docs: &[Document]) -> Self {
        let index = FrequencyIndex::rebuild(docs.iter().map(|d| (d.id, d.content.as_str())));
        let mut dims = None;
        for doc in docs.iter().filter(|d| d.has_embedding()) {
            let len = doc.embedding.as_ref().map_or(0, |v| v.len());
            match dims {
                None => dims = Some(len),
                Some(expected) if expected != len => {
                    tracing::warn!(
                        id = doc.id,
                        expected,
                        actual = len,
                        "stored embedding dimensionality differs from corpus; ignored in vector scoring"
                    );
                }
                Some(_) => {}
            }
        }
        Self { index, dims }
    }

    /// The index holds exactly the documents of `docs`.
    fn covers(&self, docs: &[Document]) -> bool {
        docs.len() == self.index.total_document_count()
            && docs.iter().all(|d| self.index.contains(d.id))
    }
}

/// Hybrid search over a [`DocumentStore`].
pub struct SearchEngine {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn EmbeddingProvider>,
    settings: EngineSettings,
    state: RwLock<IndexState>,
}

impl SearchEngine {
    /// Build the frequency index from a full scan of the store.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        settings: EngineSettings,
    ) -> Result<Self, StoreError> {
        let docs = fetch_with_timeout(store.as_ref(), settings.fetch_timeout).await?;
        let state = IndexState::from_documents(&docs);
        tracing::info!(
            documents = docs.len(),
            unique_terms = state.index.unique_term_count(),
            provider = provider.model_name(),
            "frequency index built"
        );
        Ok(Self {
            store,
            provider,
            settings,
            state: RwLock::new(state),
        })
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Hybrid ranking, or the lexical fallback without a usable query vector.
    pub async fn hybrid_search(&self, query: &str, k: Option<i64>, explain: bool) -> SearchResponse {
        self.search(query, SearchMode::Hybrid, k, explain).await
    }

    /// Cosine ranking over embedded documents, or the lexical fallback
    /// without a usable query vector.
    pub async fn vector_search(&self, query: &str, k: Option<i64>, explain: bool) -> SearchResponse {
        self.search(query, SearchMode::Vector, k, explain).await
    }

    /// Keyword-overlap ranking. Never calls the embedding provider.
    pub async fn keyword_search(&self, query: &str, k: Option<i64>, explain: bool) -> SearchResponse {
        self.search(query, SearchMode::Keyword, k, explain).await
    }

    /// Run one search. Never fails: degraded conditions are reported through
    /// the response's path tag and `store_unavailable` flag.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        k: Option<i64>,
        explain: bool,
    ) -> SearchResponse {
        let k = self.settings.params.clamp_limit(k);

        if query.trim().is_empty() {
            return SearchResponse::empty(self.nominal_path(mode));
        }

        let tokens = tokenize(query);
        let query_vec = match mode {
            SearchMode::Keyword => None,
            SearchMode::Hybrid | SearchMode::Vector => self.embed_query(query).await,
        };

        let (state, documents) = match self.synced_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let dims = self.state.read().await.dims;
                let usable = query_vec.as_deref().is_some_and(|v| matches_dims(v, dims));
                tracing::warn!(error = %e, "document fetch failed; returning no results");
                return SearchResponse::store_unavailable(select_path(mode, usable));
            }
        };

        let query_vec = query_vec.filter(|v| matches_dims(v, state.dims));
        let path = select_path(mode, query_vec.is_some());
        tracing::debug!(%path, tokens = tokens.len(), k, "scoring path selected");

        let ctx = RankContext {
            documents: &documents,
            index: &state.index,
            params: &self.settings.params,
            k,
            explain,
        };

        let results = match (path, query_vec.as_deref()) {
            (ScoringPath::Hybrid, Some(q)) => rank_hybrid(&ctx, &tokens, q),
            (ScoringPath::PureVector, Some(q)) => rank_vector(&ctx, q),
            (ScoringPath::Keyword, _) => rank_keyword(&ctx, &tokens),
            _ => rank_lexical(&ctx, &tokens),
        };

        SearchResponse {
            path,
            results,
            store_unavailable: false,
        }
    }

    /// Persist a document and fold it into the frequency index.
    ///
    /// `metadata` must be a JSON object or null. Embedding failures are not
    /// errors: the document is stored without a vector.
    pub async fn add_document(
        &self,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<DocumentId, IngestError> {
        if content.trim().is_empty() {
            return Err(IngestError::EmptyContent);
        }
        let metadata = parse_metadata(metadata)?;

        let embedding = self.embed_document(content).await;

        let mut state = self.state.write().await;

        if let (Some(expected), Some(vec)) = (state.dims, embedding.as_ref()) {
            if vec.len() != expected {
                return Err(IngestError::DimensionMismatch {
                    expected,
                    actual: vec.len(),
                });
            }
        }

        let embedded_dims = embedding.as_ref().map(|v| v.len());
        let doc = NewDocument::new(content, metadata).with_embedding(embedding);
        let id = match tokio::time::timeout(self.settings.fetch_timeout, self.store.insert(doc)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(StoreError::Timeout(self.settings.fetch_timeout).into()),
        };

        state.index.update(id, content);
        if state.dims.is_none() {
            state.dims = embedded_dims;
        }

        tracing::info!(id, embedded = embedded_dims.is_some(), "document added");
        Ok(id)
    }

    /// Corpus counts. Rebuilds the index first when the store holds a
    /// different number of documents than the index knows about.
    pub async fn stats(&self) -> Result<EngineStats, StoreError> {
        let document_count = self.store.count().await?;
        let indexed_with_embedding_count = self.store.count_with_embedding().await?;
        let stale = self.state.read().await.index.total_document_count() != document_count;
        if stale {
            tracing::info!(document_count, "store changed outside this engine");
            self.rebuild_index().await?;
        }
        let state = self.state.read().await;
        let provider_dims = Some(self.provider.dims()).filter(|d| *d > 0);

        Ok(EngineStats {
            document_count,
            indexed_with_embedding_count,
            indexed_document_count: state.index.total_document_count(),
            unique_term_count: state.index.unique_term_count(),
            embedding_model: self.provider.model_name().to_string(),
            embedding_dims: state.dims.or(provider_dims),
        })
    }

    /// Replace the frequency index with one built from a fresh full scan.
    /// Returns the number of documents indexed.
    pub async fn rebuild_index(&self) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let docs = fetch_with_timeout(self.store.as_ref(), self.settings.fetch_timeout).await?;
        *state = IndexState::from_documents(&docs);
        tracing::info!(documents = docs.len(), "frequency index rebuilt");
        Ok(docs.len())
    }

    /// Documents in insertion order, paginated.
    pub async fn list_documents(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = fetch_with_timeout(self.store.as_ref(), self.settings.fetch_timeout).await?;
        Ok(docs.into_iter().skip(offset).take(limit).collect())
    }

    /// Read-locked index plus a full scan it agrees with. A scan that
    /// disagrees with the index triggers a rebuild under the write lock.
    async fn synced_snapshot(
        &self,
    ) -> Result<(RwLockReadGuard<'_, IndexState>, Vec<Document>), StoreError> {
        let state = self.state.read().await;
        let docs = fetch_with_timeout(self.store.as_ref(), self.settings.fetch_timeout).await?;
        if state.covers(&docs) {
            return Ok((state, docs));
        }
        drop(state);

        let mut state = self.state.write().await;
        let docs = fetch_with_timeout(self.store.as_ref(), self.settings.fetch_timeout).await?;
        if !state.covers(&docs) {
            tracing::info!(
                documents = docs.len(),
                indexed = state.index.total_document_count(),
                "store changed outside this engine; rebuilding frequency index"
            );
            *state = IndexState::from_documents(&docs);
        }
        Ok((state.downgrade(), docs))
    }

    fn nominal_path(&self, mode: SearchMode) -> ScoringPath {
        match mode {
            SearchMode::Keyword => ScoringPath::Keyword,
            _ if !self.provider.is_available() => ScoringPath::LexicalFallback,
            SearchMode::Hybrid => ScoringPath::Hybrid,
            SearchMode::Vector => ScoringPath::PureVector,
        }
    }

    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        if !self.provider.is_available() {
            return None;
        }
        let result =
            tokio::time::timeout(self.settings.embed_timeout, self.provider.embed_query(query)).await;
        usable_vector(result, self.settings.embed_timeout, "query")
    }

    async fn embed_document(&self, content: &str) -> Option<Vec<f32>> {
        if !self.provider.is_available() {
            return None;
        }
        let result = tokio::time::timeout(
            self.settings.embed_timeout,
            self.provider.embed_document(content),
        )
        .await;
        usable_vector(result, self.settings.embed_timeout, "document")
    }
}

/// Open the SQLite store named by `config`, apply the schema, select the
/// embedding provider, and build the engine.
pub async fn open_engine(config: &Config) -> anyhow::Result<SearchEngine> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;
    let provider = embedding::create_provider(&config.embedding)?;
    let store = Arc::new(SqliteStore::new(pool));
    let engine = SearchEngine::open(store, provider, EngineSettings::from_config(config))
        .await
        .context("Failed to load documents")?;
    Ok(engine)
}

fn select_path(mode: SearchMode, has_query_vec: bool) -> ScoringPath {
    match (mode, has_query_vec) {
        (SearchMode::Keyword, _) => ScoringPath::Keyword,
        (SearchMode::Hybrid, true) => ScoringPath::Hybrid,
        (SearchMode::Vector, true) => ScoringPath::PureVector,
        (_, false) => ScoringPath::LexicalFallback,
    }
}

/// A query vector is usable only at the corpus dimensionality.
fn matches_dims(vec: &[f32], dims: Option<usize>) -> bool {
    match dims {
        Some(dims) if dims != vec.len() => {
            tracing::warn!(
                expected = dims,
                actual = vec.len(),
                "query embedding dimensionality differs from corpus; using lexical scoring"
            );
            false
        }
        _ => true,
    }
}

fn usable_vector(
    result: Result<anyhow::Result<Option<Vec<f32>>>, tokio::time::error::Elapsed>,
    timeout: Duration,
    what: &str,
) -> Option<Vec<f32>> {
    match result {
        Ok(Ok(Some(vec))) if !vec.is_empty() => Some(vec),
        Ok(Ok(_)) => {
            tracing::debug!(kind = what, "embedding unavailable");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(kind = what, error = %e, "embedding failed; using lexical scoring");
            None
        }
        Err(_) => {
            tracing::warn!(kind = what, ?timeout, "embedding timed out; using lexical scoring");
            None
        }
    }
}

async fn fetch_with_timeout(
    store: &dyn DocumentStore,
    timeout: Duration,
) -> Result<Vec<Document>, StoreError> {
    match tokio::time::timeout(timeout, store.all_documents()).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

fn parse_metadata(metadata: Option<Value>) -> Result<Metadata, IngestError> {
    match metadata {
        None | Some(Value::Null) => Ok(Metadata::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(IngestError::InvalidMetadata(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
