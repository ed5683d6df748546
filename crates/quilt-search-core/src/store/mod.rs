//! Storage abstraction for Quilt Search.
//!
//! The [`DocumentStore`] trait is the only persistence contract the ranker
//! needs: insert, full scan, and counts. There is no update or delete path.
//! Reconnect and retry policy belong to the implementation.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Document, DocumentId, NewDocument};

/// Abstract document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](DocumentStore::insert) | Persist a new document, assigning its id |
/// | [`all_documents`](DocumentStore::all_documents) | Full scan in insertion order |
/// | [`count`](DocumentStore::count) | Number of stored documents |
/// | [`count_with_embedding`](DocumentStore::count_with_embedding) | Documents carrying a vector |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a document and return its newly assigned id.
    async fn insert(&self, doc: NewDocument) -> Result<DocumentId, StoreError>;

    /// Every stored document, ordered by insertion (ascending id).
    async fn all_documents(&self) -> Result<Vec<Document>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    async fn count_with_embedding(&self) -> Result<usize, StoreError>;
}
