//! TOML configuration.
//!
//! `[db]` is required; every other section falls back to defaults. API keys
//! never live in the file: remote providers read `OPENAI_API_KEY` or
//! `COHERE_API_KEY` from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quilt_search_core::lexical::LexicalWeights;
use quilt_search_core::search::{HybridWeights, SearchParams, Thresholds};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Bound on a full-corpus fetch during search.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_tfidf_weight")]
    pub tfidf_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_lexical_tfidf_weight")]
    pub lexical_tfidf_weight: f64,
    #[serde(default = "default_lexical_keyword_weight")]
    pub lexical_keyword_weight: f64,
    #[serde(default = "default_hybrid_threshold")]
    pub hybrid_threshold: f64,
    #[serde(default = "default_vector_threshold")]
    pub vector_threshold: f64,
    #[serde(default)]
    pub lexical_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            vector_weight: default_vector_weight(),
            tfidf_weight: default_tfidf_weight(),
            keyword_weight: default_keyword_weight(),
            lexical_tfidf_weight: default_lexical_tfidf_weight(),
            lexical_keyword_weight: default_lexical_keyword_weight(),
            hybrid_threshold: default_hybrid_threshold(),
            vector_threshold: default_vector_threshold(),
            lexical_threshold: 0.0,
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_max_limit() -> usize {
    20
}
fn default_vector_weight() -> f64 {
    0.6
}
fn default_tfidf_weight() -> f64 {
    0.25
}
fn default_keyword_weight() -> f64 {
    0.15
}
fn default_lexical_tfidf_weight() -> f64 {
    0.7
}
fn default_lexical_keyword_weight() -> f64 {
    0.3
}
fn default_hybrid_threshold() -> f64 {
    0.1
}
fn default_vector_threshold() -> f64 {
    0.1
}

impl RetrievalConfig {
    /// Convert to the ranker's parameter set.
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            weights: HybridWeights {
                vector: self.vector_weight,
                tfidf: self.tfidf_weight,
                keyword: self.keyword_weight,
            },
            lexical: LexicalWeights {
                tfidf: self.lexical_tfidf_weight,
                keyword: self.lexical_keyword_weight,
            },
            thresholds: Thresholds {
                hybrid: self.hybrid_threshold,
                vector: self.vector_threshold,
                lexical: self.lexical_threshold,
                keyword: 0.0,
            },
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL, used by the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Config {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.db.fetch_timeout_secs)
    }
}

/// Parse a TOML string and validate it.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    config
        .retrieval
        .search_params()
        .validate()
        .context("Invalid [retrieval] section")?;

    for (name, value) in [
        ("hybrid_threshold", config.retrieval.hybrid_threshold),
        ("vector_threshold", config.retrieval.vector_threshold),
        ("lexical_threshold", config.retrieval.lexical_threshold),
    ] {
        if !(0.0..1.0).contains(&value) {
            anyhow::bail!("retrieval.{} must be in [0.0, 1.0)", name);
        }
    }

    if config.db.fetch_timeout_secs == 0 {
        anyhow::bail!("db.fetch_timeout_secs must be > 0");
    }

    // Validate embedding
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "disabled" | "cohere" | "local" => {}
        "openai" | "ollama" => {
            if embedding.dims.is_none() || embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                );
            }
            if embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, cohere, or local.",
            other
        ),
    }
    if embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if embedding.is_enabled() && embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/quilt.sqlite\"\n").unwrap();
        assert_eq!(cfg.db.fetch_timeout_secs, 10);
        assert_eq!(cfg.retrieval.default_limit, 5);
        assert_eq!(cfg.retrieval.max_limit, 20);
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.server.bind, "127.0.0.1:7340");
        assert_eq!(cfg.logging.level, LogLevel::Info);
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert_eq!(cfg.retrieval.search_params(), SearchParams::default());
    }

    #[test]
    fn test_missing_db_section_fails() {
        assert!(parse_config("[server]\nbind = \"127.0.0.1:1\"\n").is_err());
    }

    #[test]
    fn test_rejects_non_dominant_vector_weight() {
        let err = parse_config(
            r#"
[db]
path = "x.sqlite"

[retrieval]
vector_weight = 0.2
tfidf_weight = 0.5
keyword_weight = 0.3
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("vector_weight"));
    }

    #[test]
    fn test_openai_requires_dims_and_model() {
        let err = parse_config(
            r#"
[db]
path = "x.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_provider_fails() {
        let err = parse_config(
            r#"
[db]
path = "x.sqlite"

[embedding]
provider = "word2vec"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_cohere_without_model_is_allowed() {
        let cfg = parse_config(
            r#"
[db]
path = "x.sqlite"

[embedding]
provider = "cohere"

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();
        assert!(cfg.embedding.is_enabled());
        assert_eq!(cfg.logging.level, LogLevel::Debug);
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }
}
