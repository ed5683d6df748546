//! `quilt add` and `quilt import`.
//!
//! Both go through [`SearchEngine::add_document`](crate::engine::SearchEngine::add_document),
//! so every stored document is also in the frequency index. Embedding
//! failures are non-fatal; the document is stored without a vector.

use anyhow::{Context, Result};
use std::path::Path;

use quilt_search_core::error::IngestError;

use crate::config::Config;
use crate::connector_fs;
use crate::engine::open_engine;

/// Parse a `--metadata` argument.
pub fn parse_metadata_arg(raw: Option<&str>) -> Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(s).context("--metadata must be valid JSON"))
        .transpose()
}

pub async fn run_add(config: &Config, content: &str, metadata: Option<&str>) -> Result<()> {
    let metadata = parse_metadata_arg(metadata)?;
    let engine = open_engine(config).await?;
    let id = engine.add_document(content, metadata).await?;
    println!("added document {}", id);
    Ok(())
}

pub async fn run_import(
    config: &Config,
    dir: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let items = connector_fs::scan_directory(dir, include, exclude)?;
    let engine = open_engine(config).await?;
    let embedded_before = engine.stats().await?.indexed_with_embedding_count;

    let mut added = 0u64;
    let mut skipped = 0u64;

    for item in &items {
        match engine
            .add_document(&item.content, Some(item.metadata()))
            .await
        {
            Ok(id) => {
                tracing::debug!(id, path = %item.relative_path, "imported file");
                added += 1;
            }
            Err(IngestError::EmptyContent) => {
                tracing::debug!(path = %item.relative_path, "skipping empty file");
                skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to import {}", item.relative_path))
            }
        }
    }

    let embedded_after = engine.stats().await?.indexed_with_embedding_count;

    println!("import {}", dir.display());
    println!("  files found: {}", items.len());
    println!("  documents added: {}", added);
    println!("  skipped (empty): {}", skipped);
    if engine.provider().is_available() {
        println!(
            "  embeddings written: {}",
            embedded_after.saturating_sub(embedded_before)
        );
    }
    println!("ok");
    Ok(())
}
