//! Corpus statistics.
//!
//! Used by `quilt stats` to confirm that imports and embeddings are working.

use anyhow::Result;

use crate::config::Config;
use crate::engine::{open_engine, EngineStats};

/// Run the stats command and print a summary.
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let stats = engine.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    print_stats(config, &stats, db_size);
    Ok(())
}

fn print_stats(config: &Config, stats: &EngineStats, db_size: u64) {
    println!("Quilt Search Corpus Stats");
    println!("=========================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Documents:    {}", stats.document_count);
    println!(
        "  Embedded:     {} / {} ({}%)",
        stats.indexed_with_embedding_count,
        stats.document_count,
        percent(stats.indexed_with_embedding_count, stats.document_count)
    );
    println!("  Unique terms: {}", stats.unique_term_count);
    println!(
        "  Embeddings:   {}{}",
        stats.embedding_model,
        stats
            .embedding_dims
            .map(|d| format!(" ({} dims)", d))
            .unwrap_or_default()
    );
    println!();
}

fn percent(part: usize, whole: usize) -> usize {
    if whole == 0 {
        0
    } else {
        part * 100 / whole
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
