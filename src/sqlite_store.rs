//! SQLite-backed [`DocumentStore`] implementation.
//!
//! One row per document in the `documents` table (see [`crate::migrate`]).
//! Embeddings are little-endian f32 BLOBs with their length recorded in
//! `embedding_dims`; metadata is a JSON object in `metadata_json`.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use quilt_search_core::embedding::{try_blob_to_vec, vec_to_blob};
use quilt_search_core::error::StoreError;
use quilt_search_core::models::{Document, DocumentId, Metadata, NewDocument};
use quilt_search_core::store::DocumentStore;

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn row_to_document(row: &SqliteRow) -> Result<Document, StoreError> {
    let id: i64 = row.try_get("id").map_err(unavailable)?;
    let content: String = row.try_get("content").map_err(unavailable)?;
    let blob: Option<Vec<u8>> = row.try_get("embedding").map_err(unavailable)?;
    let dims: Option<i64> = row.try_get("embedding_dims").map_err(unavailable)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(unavailable)?;
    let created_at: i64 = row.try_get("created_at").map_err(unavailable)?;

    let embedding = match blob {
        None => None,
        Some(bytes) => {
            let vec = try_blob_to_vec(&bytes).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "document {}: embedding blob of {} bytes is not f32-aligned",
                    id,
                    bytes.len()
                ))
            })?;
            if let Some(d) = dims {
                if d as usize != vec.len() {
                    return Err(StoreError::Corrupt(format!(
                        "document {}: embedding has {} values, row says {}",
                        id,
                        vec.len(),
                        d
                    )));
                }
            }
            Some(vec)
        }
    };

    let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
        StoreError::Corrupt(format!("document {}: metadata is not a JSON object: {}", id, e))
    })?;

    Ok(Document {
        id,
        content,
        embedding,
        metadata,
        created_at,
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, doc: NewDocument) -> Result<DocumentId, StoreError> {
        let metadata_json = serde_json::to_string(&doc.metadata)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let blob = doc.embedding.as_deref().map(vec_to_blob);
        let dims = doc.embedding.as_ref().map(|v| v.len() as i64);

        let result = sqlx::query(
            "INSERT INTO documents (content, embedding, embedding_dims, metadata_json, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.content)
        .bind(blob)
        .bind(dims)
        .bind(&metadata_json)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.last_insert_rowid())
    }

    async fn all_documents(&self) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, content, embedding, embedding_dims, metadata_json, created_at \
             FROM documents ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(n as usize)
    }

    async fn count_with_embedding(&self) -> Result<usize, StoreError> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE embedding IS NOT NULL AND length(embedding) > 0",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(n as usize)
    }
}
