//! # Quilt Search Core
//!
//! Runtime-agnostic retrieval logic for Quilt Search: tokenization, the
//! frequency index, lexical and vector scoring, the ranking passes, and the
//! store and embedding-provider traits.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network code.
//! Locking, timeouts, and concrete backends live in the `quilt-search`
//! application crate.
//!
//! ## Scoring overview
//!
//! | Path | Formula |
//! |------|---------|
//! | hybrid | `w_v × vector + w_t × tfidf + w_k × keyword` |
//! | lexical-fallback | `0.7 × tfidf + 0.3 × keyword` |
//! | pure-vector | `max(0, cosine)` |
//! | keyword | distinct query-token overlap |

pub mod embedding;
pub mod error;
pub mod index;
pub mod lexical;
pub mod models;
pub mod search;
pub mod store;
pub mod tokenize;
