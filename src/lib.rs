//! # Quilt Search
//!
//! Hybrid search over a local document store: TF-IDF, keyword overlap, and
//! embedding similarity blended into one ranking, with a lexical fallback
//! whenever embeddings are unavailable.
//!
//! Ranking logic lives in the `quilt-search-core` crate. This crate adds
//! configuration, the SQLite store, embedding providers, the
//! [`engine::SearchEngine`] service, the `quilt` CLI, and an HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ add/import  │──▶│ SearchEngine │──▶│  SQLite  │
//! └─────────────┘   │ index + lock │   └──────────┘
//!                   └──────┬───────┘
//!                          │ embed
//!                          ▼
//!                   ┌──────────────┐
//!                   │   provider   │ openai / ollama / cohere / local
//!                   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! quilt init
//! quilt import ./docs
//! quilt search "machine learning" --explain
//! quilt serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`embedding`] | Embedding providers |
//! | [`engine`] | Search engine service |
//! | [`connector_fs`] | Filesystem scanner |
//! | [`ingest`] | `add` and `import` commands |
//! | [`search`] | `search` command |
//! | [`list`] | Document listing |
//! | [`stats`] | Corpus statistics |
//! | [`server`] | HTTP server |

pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod list;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
