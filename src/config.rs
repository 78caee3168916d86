//! TOML configuration.
//!
//! Every section is optional; missing fields fall back to the defaults
//! below. Secrets never live in the file: API keys are read from
//! `GEMINI_API_KEY`, `OPENAI_API_KEY` and `GITHUB_TOKEN`.
//!
//! ```toml
//! [store]
//! backend = "sqlite"          # sqlite | chroma | memory
//! path = "./data/repo-help.sqlite"
//!
//! [ingest]
//! concurrency = 10
//! max_files = 10
//!
//! [embedding]
//! provider = "gemini"         # gemini | openai | ollama | local | disabled
//! model = "embedding-001"
//!
//! [llm]
//! provider = "gemini"         # gemini | openai | ollama | disabled
//! model = "gemini-1.5-flash"
//!
//! [source]
//! kind = "github"             # github | local
//!
//! [retrieval]
//! top_k = 3
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Chroma server URL.
    #[serde(default = "default_chroma_url")]
    pub url: String,
    /// Chroma collection name.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            url: default_chroma_url(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_backend() -> String {
    "sqlite".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/repo-help.sqlite")
}
fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_collection() -> String {
    "repo-help".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Maximum number of files processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Files taken from a listing per analyze request.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_files: default_max_files(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}
fn default_max_files() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (Ollama, OpenAI-compatible or Gemini proxies).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff unit; the n-th retry waits `n × backoff_ms`.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            url: None,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Rewrite queries through the LLM before embedding them.
    #[serde(default = "default_true")]
    pub expand_queries: bool,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            url: None,
            expand_queries: true,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_true() -> bool {
    true
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_github_api")]
    pub api_url: String,
    #[serde(default = "default_github_raw")]
    pub raw_url: String,
    /// Root holding `<owner>/<project>/` trees for the local source.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            branch: default_branch(),
            api_url: default_github_api(),
            raw_url: default_github_raw(),
            root: None,
            include_globs: default_include_globs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_source_kind() -> String {
    "github".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_github_api() -> String {
    "https://api.github.com".to_string()
}
fn default_github_raw() -> String {
    "https://raw.githubusercontent.com".to_string()
}
fn default_include_globs() -> Vec<String> {
    ["js", "ts", "jsx", "tsx", "py", "md"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
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
    "127.0.0.1:3000".to_string()
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.ingest.concurrency == 0 {
        bail!("ingest.concurrency must be > 0");
    }
    if config.ingest.max_files == 0 {
        bail!("ingest.max_files must be > 0");
    }
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be > 0");
    }
    if config.embedding.max_attempts == 0 {
        bail!("embedding.max_attempts must be > 0");
    }

    match config.store.backend.as_str() {
        "sqlite" | "chroma" | "memory" => {}
        other => bail!(
            "Unknown store backend: '{}'. Must be sqlite, chroma, or memory.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "gemini" | "openai" | "ollama" | "local" | "disabled" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be gemini, openai, ollama, local, or disabled.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "gemini" | "openai" | "ollama" | "disabled" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be gemini, openai, ollama, or disabled.",
            other
        ),
    }

    match config.source.kind.as_str() {
        "github" => {}
        "local" => {
            if config.source.root.is_none() {
                bail!("source.root must be set when source.kind is 'local'");
            }
        }
        other => bail!("Unknown source kind: '{}'. Must be github or local.", other),
    }

    if config.source.include_globs.is_empty() {
        bail!("source.include_globs must not be empty");
    }

    Ok(())
}
