//! Summarizer and query-expansion adapters over a [`TextGenerator`].
//!
//! The summarizer asks the model for the delimited format understood by
//! [`repo_help_core::summary::parse_delimited`] and hands the ingestion
//! pipeline a structured [`Summary`]; the pipeline never sees raw model
//! text.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use repo_help_core::summary::{
    parse_delimited, Summary, SummaryChunk, CHUNK_DELIMITER, CODE_DELIMITER,
};

use crate::llm::TextGenerator;

/// Raw file text → ordered summary chunks.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, path: &str, raw: &str) -> Result<Summary>;
}

/// Query text → richer query text.
#[async_trait]
pub trait QueryExpander: Send + Sync {
    async fn expand(&self, query: &str) -> Result<String>;
}

/// [`Summarizer`] backed by an LLM prompt.
pub struct LlmSummarizer {
    generator: Arc<dyn TextGenerator>,
}

impl LlmSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

fn summary_prompt(path: &str, raw: &str) -> String {
    format!(
        "You are an expert software assistant. Summarize the file `{path}` below.\n\
         \n\
         First write a file-level summary as bullet points: the feature(s) it implements, \
         what a user does with it and what the backend does, and which page or module it \
         belongs to if that is obvious.\n\
         \n\
         Then, for each function or class, write a line containing only `{chunk}`, \
         followed by bullet points describing what it does, then a line containing only \
         `{code}`, followed by the function's code.\n\
         \n\
         ```\n{raw}\n```\n",
        path = path,
        raw = raw,
        chunk = CHUNK_DELIMITER,
        code = CODE_DELIMITER,
    )
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, path: &str, raw: &str) -> Result<Summary> {
        let text = self.generator.generate(&summary_prompt(path, raw)).await?;
        let summary = parse_delimited(&text);
        if summary.is_empty() {
            bail!("summarizer returned no content for {}", path);
        }
        tracing::debug!(
            path,
            input_chars = raw.len(),
            chunks = summary.chunks.len(),
            "summarized file"
        );
        Ok(summary)
    }
}

/// [`QueryExpander`] backed by an LLM prompt.
pub struct LlmQueryExpander {
    generator: Arc<dyn TextGenerator>,
}

impl LlmQueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

fn expansion_prompt(query: &str) -> String {
    format!(
        "Rewrite the following issue as a search query over summaries of source files. \
         Mention the features, pages, functions and backend behaviour likely involved. \
         Reply with the rewritten query only.\n\n{}\n",
        query
    )
}

#[async_trait]
impl QueryExpander for LlmQueryExpander {
    async fn expand(&self, query: &str) -> Result<String> {
        let expanded = self.generator.generate(&expansion_prompt(query)).await?;
        Ok(expanded.trim().to_string())
    }
}

/// [`Summarizer`] used when no text generator is configured.
///
/// The whole file becomes a single chunk; its text is the raw content
/// cut to `max_chars`.
pub struct RawSummarizer {
    max_chars: usize,
}

impl RawSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for RawSummarizer {
    fn default() -> Self {
        Self::new(8_000)
    }
}

#[async_trait]
impl Summarizer for RawSummarizer {
    async fn summarize(&self, path: &str, raw: &str) -> Result<Summary> {
        let text: String = raw.chars().take(self.max_chars).collect();
        if text.trim().is_empty() {
            bail!("{} is empty", path);
        }
        Ok(Summary::new(vec![SummaryChunk::text(format!(
            "{}\n{}",
            path, text
        ))]))
    }
}
