//! `quilt search`.
//!
//! Ranking lives in [`quilt_search_core::search`] and mode selection in
//! [`SearchEngine`](crate::engine::SearchEngine); this module prints.

use anyhow::Result;

use quilt_search_core::search::{SearchMode, SearchResponse};

use crate::config::Config;
use crate::engine::open_engine;
use crate::list::excerpt;

pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    limit: Option<i64>,
    explain: bool,
    json: bool,
) -> Result<()> {
    let mode: SearchMode = mode.parse()?;
    let engine = open_engine(config).await?;
    let response = engine.search(query, mode, limit, explain).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_human(&response);
    }
    Ok(())
}

fn print_human(response: &SearchResponse) {
    if response.store_unavailable {
        println!("Document store unavailable; no results.");
        return;
    }
    if response.results.is_empty() {
        println!("No results.");
        return;
    }

    println!("path: {}", response.path);
    println!();
    for (i, result) in response.results.iter().enumerate() {
        let title = result
            .metadata
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("(untitled)");

        println!("{}. [{:.3}] {}", i + 1, result.score, title);
        println!("    created: {}", result.created_at);
        println!("    excerpt: \"{}\"", excerpt(&result.content, 240));
        if let Some(b) = result.explain {
            println!(
                "    explain: vector={:.3} tfidf={:.3} keyword={:.3}",
                b.vector, b.tfidf, b.keyword
            );
        }
        println!("    id: {}", result.id);
        println!();
    }
}
