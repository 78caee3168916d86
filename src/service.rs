//! Application facade.
//!
//! [`RepoHelp`] wires a content source, summarizer, embedder and store
//! into the ingestion and query pipelines. The CLI and the HTTP server
//! both go through it.

use std::sync::Arc;

use repo_help_core::models::{EntryPage, MatchResult, Namespace};
use repo_help_core::store::VectorStore;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::embedding::{create_embedder, RetryPolicy, RetryingEmbedder};
use crate::error::{Error, Result};
use crate::ingest::{IngestReport, Ingestor};
use crate::llm::create_generator;
use crate::query::QueryPipeline;
use crate::source::{create_source, ContentSource};
use crate::store::create_store;
use crate::summarize::{
    LlmQueryExpander, LlmSummarizer, QueryExpander, RawSummarizer, Summarizer,
};

/// Limits applied by the facade.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub concurrency: usize,
    pub max_files: usize,
    pub top_k: usize,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.ingest.concurrency,
            max_files: config.ingest.max_files,
            top_k: config.retrieval.top_k,
        }
    }
}

/// Result of [`RepoHelp::analyze`].
#[derive(Debug, Serialize)]
pub struct Analysis {
    pub results: Vec<MatchResult>,
    pub ingest: IngestReport,
}

pub struct RepoHelp {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn VectorStore>,
    ingestor: Ingestor,
    query: QueryPipeline,
    max_files: usize,
}

impl RepoHelp {
    pub fn new(
        source: Arc<dyn ContentSource>,
        summarizer: Arc<dyn Summarizer>,
        expander: Option<Arc<dyn QueryExpander>>,
        embedder: RetryingEmbedder,
        store: Arc<dyn VectorStore>,
        settings: Settings,
    ) -> Self {
        let ingestor = Ingestor::new(
            Arc::clone(&source),
            summarizer,
            embedder.clone(),
            Arc::clone(&store),
            settings.concurrency,
        );
        let query = QueryPipeline::new(expander, embedder, Arc::clone(&store), settings.top_k);
        Self {
            source,
            store,
            ingestor,
            query,
            max_files: settings.max_files,
        }
    }

    /// Build every component from configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = create_source(&config.source)?;
        let store = create_store(&config.store).await?;
        let embedder = RetryingEmbedder::new(
            create_embedder(&config.embedding)?,
            RetryPolicy::from_config(&config.embedding),
        );

        let generator = create_generator(&config.llm)?;
        let summarizer: Arc<dyn Summarizer> = match &generator {
            Some(g) => Arc::new(LlmSummarizer::new(Arc::clone(g))),
            None => {
                tracing::info!("llm disabled, indexing raw file text");
                Arc::new(RawSummarizer::default())
            }
        };
        let expander: Option<Arc<dyn QueryExpander>> = match generator {
            Some(g) if config.llm.expand_queries => Some(Arc::new(LlmQueryExpander::new(g))),
            _ => None,
        };

        tracing::info!(
            source = %config.source.kind,
            store = %config.store.backend,
            embedder = embedder.model_name(),
            "service ready"
        );
        Ok(Self::new(
            source,
            summarizer,
            expander,
            embedder,
            store,
            Settings::from(config),
        ))
    }

    /// Indexable files of `namespace`, at most `limit` of them.
    pub async fn list_files(
        &self,
        namespace: &Namespace,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let mut files = self
            .source
            .list_files(namespace)
            .await
            .map_err(Error::source_failure)?;
        if let Some(limit) = limit {
            files.truncate(limit);
        }
        Ok(files)
    }

    /// List and ingest up to `limit` files of `namespace`.
    pub async fn ingest_namespace(
        &self,
        namespace: &Namespace,
        limit: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        let files = self.list_files(namespace, limit).await?;
        self.ingestor
            .ingest_with_cancel(namespace, &files, cancel)
            .await
    }

    /// Retrieve the closest chunks for an issue.
    pub async fn answer(
        &self,
        namespace: &Namespace,
        title: &str,
        body: &str,
    ) -> Result<Vec<MatchResult>> {
        self.query.answer(namespace, title, body).await
    }

    /// Bring the namespace's index up to date, then answer the issue.
    ///
    /// At most `ingest.max_files` files of the listing are considered.
    /// An empty listing skips ingestion and answers from whatever is
    /// already stored.
    pub async fn analyze(
        &self,
        namespace: &Namespace,
        title: &str,
        body: &str,
        cancel: CancellationToken,
    ) -> Result<Analysis> {
        if title.trim().is_empty() && body.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "issue title and body are both empty".into(),
            ));
        }

        let files = self.list_files(namespace, Some(self.max_files)).await?;
        let ingest = if files.is_empty() {
            tracing::warn!(%namespace, "source listed no indexable files");
            IngestReport::default()
        } else {
            self.ingestor
                .ingest_with_cancel(namespace, &files, cancel)
                .await?
        };

        let results = self.query.answer(namespace, title, body).await?;
        Ok(Analysis { results, ingest })
    }

    /// One page of stored entries across all namespaces.
    pub async fn list_entries(&self, page: usize, limit: usize) -> Result<EntryPage> {
        if page == 0 || limit == 0 {
            return Err(Error::InvalidRequest(
                "page and limit must be at least 1".into(),
            ));
        }
        Ok(self.store.list_page(page, limit).await?)
    }
}
