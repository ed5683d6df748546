//! Error types for quilt-search-core.
//!
//! Read paths degrade on [`StoreError`] (a failed corpus fetch becomes an
//! empty, flagged result set); write paths surface it through
//! [`IngestError`] so no document is dropped silently.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    /// The operation did not complete within the configured bound.
    #[error("document store timed out after {0:?}")]
    Timeout(Duration),
    /// A stored row could not be decoded (bad embedding blob, bad metadata).
    #[error("corrupt document record: {0}")]
    Corrupt(String),
}

/// Failures of the `add_document` path.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document content must not be empty")]
    EmptyContent,
    /// Metadata was not a JSON object (or null).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    /// The new embedding does not match the corpus dimensionality.
    #[error("embedding has {actual} dimensions, corpus uses {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}
