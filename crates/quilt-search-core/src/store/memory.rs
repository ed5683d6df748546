//! In-memory [`DocumentStore`] for tests and embedded use.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Ids start at 1 and increase
//! monotonically. [`InMemoryStore::set_available`] simulates an outage:
//! while unavailable every operation returns [`StoreError::Unavailable`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Document, DocumentId, NewDocument};

use super::DocumentStore;

struct Inner {
    docs: Vec<Document>,
    next_id: DocumentId,
}

/// In-memory document store.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    available: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                docs: Vec::new(),
                next_id: 1,
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store offline".to_string()))
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("in-memory store lock poisoned".to_string())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, doc: NewDocument) -> Result<DocumentId, StoreError> {
        self.check_available()?;
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.docs.push(Document {
            id,
            content: doc.content,
            embedding: doc.embedding,
            metadata: doc.metadata,
            created_at: doc.created_at,
        });
        Ok(id)
    }

    async fn all_documents(&self) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.docs.clone())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.check_available()?;
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.docs.len())
    }

    async fn count_with_embedding(&self) -> Result<usize, StoreError> {
        self.check_available()?;
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.docs.iter().filter(|d| d.has_embedding()).count())
    }
}
