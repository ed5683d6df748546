//! # Quilt Search CLI (`quilt`)
//!
//! ## Usage
//!
//! ```bash
//! quilt --config ./config/quilt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quilt init` | Create the SQLite database and schema |
//! | `quilt add "<content>"` | Add one document |
//! | `quilt import <dir>` | Add every matching file under a directory |
//! | `quilt search "<query>"` | Search (hybrid, vector, or keyword) |
//! | `quilt list` | List stored documents |
//! | `quilt stats` | Corpus statistics |
//! | `quilt serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! quilt init
//! quilt add "Machine learning is a subset of artificial intelligence." \
//!     --metadata '{"category": "AI"}'
//! quilt import ./docs --include '**/*.md'
//! quilt search "machine learning" --explain
//! quilt search "deployment" --mode keyword --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quilt_search::{config, ingest, list, logging, migrate, search, server, stats};

/// Quilt Search: hybrid TF-IDF, keyword, and vector search over a local
/// document store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/quilt.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "quilt",
    about = "Quilt Search: hybrid TF-IDF, keyword, and vector search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/quilt.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it more than once is safe.
    Init,

    /// Add a single document.
    Add {
        /// Document text.
        content: String,

        /// Metadata as a JSON object, e.g. `{"category": "AI"}`.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Add every matching file under a directory.
    ///
    /// Each file becomes one document with `path`, `title`, and `source`
    /// metadata. Defaults to `**/*.md` and `**/*.txt`.
    Import {
        /// Directory to scan.
        dir: PathBuf,

        /// Include glob (repeatable).
        #[arg(long = "include")]
        include: Vec<String>,

        /// Exclude glob (repeatable).
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },

    /// Search stored documents.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `hybrid`, `vector`, or `keyword`.
        /// Hybrid and vector fall back to lexical scoring without embeddings.
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,

        /// Show per-signal score breakdown.
        #[arg(long)]
        explain: bool,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored documents in insertion order.
    List {
        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show corpus statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging, cli.verbose);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { content, metadata } => {
            ingest::run_add(&cfg, &content, metadata.as_deref()).await?;
        }
        Commands::Import {
            dir,
            include,
            exclude,
        } => {
            ingest::run_import(&cfg, &dir, &include, &exclude).await?;
        }
        Commands::Search {
            query,
            mode,
            limit,
            explain,
            json,
        } => {
            search::run_search(&cfg, &query, &mode, limit, explain, json).await?;
        }
        Commands::List { offset, limit } => {
            list::run_list(&cfg, offset, limit).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
