//! Text generation providers used for summaries and query expansion.
//!
//! A [`TextGenerator`] takes a prompt and returns generated text; one
//! call, no streaming, no retry. [`create_generator`] picks the backend
//! from `[llm]`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;

use crate::config::LlmConfig;

/// A prompt → text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the generator named by `config.provider`, or `None` when the
/// LLM is disabled.
pub fn create_generator(config: &LlmConfig) -> Result<Option<Arc<dyn TextGenerator>>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let generator: Arc<dyn TextGenerator> = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiGenerator {
            client,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?,
        }),
        "openai" => Arc::new(OpenAIGenerator {
            client,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api_key: std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?,
        }),
        "ollama" => Arc::new(OllamaGenerator {
            client,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: config
                .model
                .clone()
                .ok_or_else(|| anyhow!("llm.model required for Ollama provider"))?,
        }),
        "disabled" => return Ok(None),
        other => bail!("Unknown llm provider: {}", other),
    };
    Ok(Some(generator))
}

async fn json_or_error(provider: &str, response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, body);
    }
    Ok(response.json().await?)
}

fn text_at(json: &serde_json::Value, pointer: &str, provider: &str) -> Result<String> {
    let text = json
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("No text found in {} response", provider))?;
    if text.trim().is_empty() {
        bail!("{} returned empty text", provider);
    }
    Ok(text.to_string())
}

// ============ Gemini ============

pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let json = json_or_error("Gemini", response).await?;
        text_at(&json, "/candidates/0/content/parts/0/text", "Gemini")
    }
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = json_or_error("OpenAI", response).await?;
        text_at(&json, "/choices/0/message/content", "OpenAI")
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({ "model": self.model, "prompt": prompt, "stream": false });
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.base_url))?;
        let json = json_or_error("Ollama", response).await?;
        text_at(&json, "/response", "Ollama")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_at_extracts_gemini_candidate() {
        let json = json!({
            "candidates": [{ "content": { "parts": [{ "text": "- does things" }] } }]
        });
        assert_eq!(
            text_at(&json, "/candidates/0/content/parts/0/text", "Gemini").unwrap(),
            "- does things"
        );
    }

    #[test]
    fn test_text_at_rejects_missing_or_blank() {
        assert!(text_at(&json!({}), "/response", "Ollama").is_err());
        assert!(text_at(&json!({ "response": "  " }), "/response", "Ollama").is_err());
    }

    #[test]
    fn test_disabled_is_none() {
        let config = LlmConfig {
            provider: "disabled".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_generator(&config).unwrap().is_none());
    }
}
