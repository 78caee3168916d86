//! Namespace-scoped retrieval.
//!
//! `title + body` → optional LLM expansion → embedding → top-k cosine
//! search restricted to the namespace. Expansion is best effort; a
//! failed or empty expansion falls back to the original text.

use std::sync::Arc;

use repo_help_core::models::{MatchResult, Namespace};
use repo_help_core::store::VectorStore;

use crate::embedding::RetryingEmbedder;
use crate::error::{Error, Result};
use crate::summarize::QueryExpander;

pub struct QueryPipeline {
    expander: Option<Arc<dyn QueryExpander>>,
    embedder: RetryingEmbedder,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        expander: Option<Arc<dyn QueryExpander>>,
        embedder: RetryingEmbedder,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            expander,
            embedder,
            store,
            top_k: top_k.max(1),
        }
    }

    /// Closest stored chunks of `namespace` for an issue.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] when both title and body are blank.
    /// - [`Error::Embedding`] when the query cannot be embedded.
    /// - [`Error::NoMatch`] when the namespace has nothing to return.
    pub async fn answer(
        &self,
        namespace: &Namespace,
        title: &str,
        body: &str,
    ) -> Result<Vec<MatchResult>> {
        if title.trim().is_empty() && body.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "issue title and body are both empty".into(),
            ));
        }

        let text = format!("{}\n{}", title, body);
        let text = self.expand(&text).await;
        let vector = self.embedder.embed(&text).await?;

        let results = self
            .store
            .query(&vector, namespace.as_str(), self.top_k)
            .await?;
        if results.is_empty() {
            return Err(Error::NoMatch {
                namespace: namespace.to_string(),
            });
        }

        tracing::info!(%namespace, results = results.len(), "query answered");
        Ok(results)
    }

    async fn expand(&self, text: &str) -> String {
        let Some(expander) = &self.expander else {
            return text.to_string();
        };
        match expander.expand(text).await {
            Ok(expanded) if !expanded.trim().is_empty() => expanded,
            Ok(_) => {
                tracing::debug!("query expansion returned nothing, using original text");
                text.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "query expansion failed, using original text");
                text.to_string()
            }
        }
    }
}
