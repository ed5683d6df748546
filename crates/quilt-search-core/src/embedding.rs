//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] capability the ranker depends on, plus
//! pure helpers for vector serialization and similarity. Concrete backends
//! (OpenAI, Ollama, Cohere, local fastembed) live in the `quilt-search`
//! application crate.

use anyhow::Result;
use async_trait::async_trait;

/// Text-to-vector capability.
///
/// `Ok(None)` means "unavailable" (disabled backend, empty or too-short
/// input); `Err` means the call was attempted and failed. Callers treat both
/// as a signal to score lexically; neither is fatal to a search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"embed-english-light-v3.0"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (`0` when disabled).
    fn dims(&self) -> usize;
    /// `false` puts the owning engine into permanent lexical mode.
    fn is_available(&self) -> bool {
        true
    }
    /// Embed text that will be stored alongside a document.
    async fn embed_document(&self, text: &str) -> Result<Option<Vec<f32>>>;
    /// Embed a search query. Backends with asymmetric models override this.
    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>> {
        self.embed_document(text).await
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use quilt_search_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing partial values are
/// ignored; use [`try_blob_to_vec`] to reject them.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Like [`blob_to_vec`], but `None` if the length is not a multiple of 4.
pub fn try_blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(blob_to_vec(blob))
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine similarity floored at zero and capped at one, as used in blending.
///
/// Anti-correlated documents must not gain from blending, so negative
/// similarity becomes `0.0`.
pub fn vector_score(query: &[f32], doc: &[f32]) -> f64 {
    let sim = cosine_similarity(query, doc) as f64;
    if sim.is_nan() {
        return 0.0;
    }
    sim.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_blob_is_little_endian() {
        let blob = vec_to_blob(&[1.0]);
        assert_eq!(blob, vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_try_blob_rejects_partial() {
        assert!(try_blob_to_vec(&[0, 0, 128]).is_none());
        assert_eq!(try_blob_to_vec(&[]), Some(vec![]));
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_vector_score_clamps_negative() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
        assert_eq!(vector_score(&a, &b), 0.0);
    }

    #[test]
    fn test_vector_score_zero_vector() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![0.3, 0.1, 0.9];
        assert_eq!(vector_score(&zero, &v), 0.0);
        assert_eq!(vector_score(&v, &zero), 0.0);
    }

    #[test]
    fn test_vector_score_bounds() {
        let pairs = [
            (vec![0.2f32, 0.9, -0.4], vec![0.1f32, 0.8, 0.3]),
            (vec![5.0, 5.0, 5.0], vec![5.0, 5.0, 5.0]),
            (vec![-3.0, 1.0, 0.5], vec![2.0, -0.5, 7.0]),
        ];
        for (a, b) in pairs {
            let s = vector_score(&a, &b);
            assert!((0.0..=1.0).contains(&s), "score out of range: {}", s);
        }
    }
}
