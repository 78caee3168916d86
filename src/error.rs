//! Pipeline error types.
//!
//! Unit-level failures (one file, one chunk, one embedding call) are
//! absorbed and logged inside the pipelines. Only the conditions below
//! reach a caller.

use repo_help_core::store::StoreError;

/// Embedding gave up after exhausting its retry budget.
#[derive(Debug, thiserror::Error)]
#[error("embedding failed after {attempts} attempts: {last}")]
pub struct EmbeddingFailure {
    pub attempts: u32,
    #[source]
    pub last: Box<dyn std::error::Error + Send + Sync + 'static>,
}

/// Errors surfaced by the ingestion and query pipelines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `ingest` was called without any files.
    #[error("no files supplied for ingestion")]
    EmptyFileList,

    /// Missing or malformed request input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The query could not be embedded.
    #[error(transparent)]
    Embedding(#[from] EmbeddingFailure),

    /// A similarity search found nothing in the namespace.
    #[error("no matching documents found in {namespace}")]
    NoMatch { namespace: String },

    /// The vector store failed a pipeline-wide operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The content source could not list the corpus.
    #[error("content source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    pub fn source_failure(err: anyhow::Error) -> Self {
        Error::Source(err.into())
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
