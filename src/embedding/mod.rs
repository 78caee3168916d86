//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations:
//! - **[`GeminiEmbedder`]**: Google Generative Language `embedContent`.
//! - **[`OpenAIEmbedder`]**: OpenAI (or compatible) `/v1/embeddings`.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed`.
//! - **`LocalEmbedder`**: fastembed, behind `local-embeddings-fastembed`.
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are off.
//!
//! Providers make exactly one attempt per call. Retrying lives in
//! [`retry::RetryingEmbedder`], which wraps whichever provider
//! [`create_embedder`] returns.

pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use repo_help_core::embedding::Embedder;

use crate::config::EmbeddingConfig;

pub use retry::{RetryPolicy, RetryingEmbedder};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Build the provider named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"gemini"` | [`GeminiEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (needs `local-embeddings-fastembed`) |
/// | `"disabled"` | [`DisabledEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config))),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Turn a non-success response into an error carrying its body.
async fn error_for_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{} API error {}: {}", provider, status, body)
}

fn parse_vector(values: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    values
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid {} response: non-numeric component", what))
        })
        .collect()
}

// ============ Disabled ============

/// Embedder used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Gemini ============

/// Google Generative Language embeddings.
///
/// Requires `GEMINI_API_KEY`. Default model: `embedding-001`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.url.clone().unwrap_or_else(|| GEMINI_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "embedding-001".to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model);
        let body = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let json: serde_json::Value = error_for_status("Gemini", response).await?.json().await?;
        let vector = parse_gemini_response(&json)?;
        tracing::debug!(chars = text.len(), dims = vector.len(), "gemini embedding");
        Ok(vector)
    }
}

/// Extract `embedding.values` from an `embedContent` response.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .pointer("/embedding/values")
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding.values"))?;
    parse_vector(values, "Gemini")
}

// ============ OpenAI ============

/// OpenAI embeddings. Requires `OPENAI_API_KEY` and `embedding.model`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            model,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "input": [text] });
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json: serde_json::Value = error_for_status("OpenAI", response).await?.json().await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[0].embedding`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .pointer("/data/0/embedding")
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data[0].embedding"))?;
    parse_vector(values, "OpenAI")
}

// ============ Ollama ============

/// Embeddings from a local Ollama instance (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            model,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "input": [text] });
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.base_url))?;
        let json: serde_json::Value = error_for_status("Ollama", response).await?.json().await?;
        parse_ollama_response(&json)
    }
}

/// Extract `embeddings[0]`.
fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .pointer("/embeddings/0")
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings[0]"))?;
    parse_vector(values, "Ollama")
}

// ============ Local (fastembed) ============

/// Local inference via fastembed. The model is downloaded from Hugging
/// Face on first use and kept loaded afterwards.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            model_name: config
                .model
                .clone()
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string()),
            model: Arc::new(std::sync::Mutex::new(None)),
        }
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let name = self.model_name.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(
                    config_to_fastembed_model(&name)?,
                ))
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(loaded);
            }
            let embedder = guard
                .as_mut()
                .ok_or_else(|| anyhow!("local embedding model not loaded"))?;
            let mut vectors = embedder
                .embed(vec![text], None)
                .map_err(|e| anyhow!("Local embedding failed: {}", e))?;
            vectors
                .pop()
                .ok_or_else(|| anyhow!("Local embedding returned no vector"))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gemini() {
        let json = json!({ "embedding": { "values": [0.5, -1.0, 2.0] } });
        assert_eq!(parse_gemini_response(&json).unwrap(), vec![0.5, -1.0, 2.0]);
        assert!(parse_gemini_response(&json!({ "error": {} })).is_err());
    }

    #[test]
    fn test_parse_openai() {
        let json = json!({ "data": [{ "index": 0, "embedding": [0.25, 0.75] }] });
        assert_eq!(parse_openai_response(&json).unwrap(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_parse_ollama_rejects_non_numeric() {
        assert_eq!(
            parse_ollama_response(&json!({ "embeddings": [[1.0, 2.0]] })).unwrap(),
            vec![1.0, 2.0]
        );
        assert!(parse_ollama_response(&json!({ "embeddings": [["x"]] })).is_err());
    }

    #[tokio::test]
    async fn test_disabled_embedder_fails() {
        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
        assert!(embedder.embed("hello").await.is_err());
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "magic".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
