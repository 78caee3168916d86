//! Vector store backends.
//!
//! | Backend | Type | Notes |
//! |---------|------|-------|
//! | `sqlite` | [`SqliteStore`] | single file, brute-force cosine search |
//! | `chroma` | [`ChromaStore`] | Chroma HTTP API, one shared collection |
//! | `memory` | [`InMemoryStore`] | process-local, lost on exit |
//!
//! All backends implement [`VectorStore`] from `repo-help-core`; the
//! batch and namespace guarantees live there.

pub mod chroma;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{bail, Result};
pub use repo_help_core::store::memory::InMemoryStore;
pub use repo_help_core::store::{
    add_batch, existing_ids_for_namespace, BatchReport, StoreError, VectorStore,
};

pub use chroma::ChromaStore;
pub use sqlite::SqliteStore;

use crate::config::StoreConfig;

/// Open the backend named by `config.backend`.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteStore::open(&config.path).await?)),
        "chroma" => Ok(Arc::new(ChromaStore::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        other => bail!("Unknown store backend: {}", other),
    }
}
