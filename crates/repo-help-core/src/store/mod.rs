//! Vector store contract.
//!
//! The [`VectorStore`] trait is the narrow set of backend primitives the
//! pipelines need. The adapter-level guarantees are layered on top as
//! free functions so every backend gets them unchanged:
//!
//! | Function | Guarantee |
//! |----------|-----------|
//! | [`existing_ids_for_namespace`] | an unknown namespace is an empty set, not an error |
//! | [`add_batch`] | malformed entries never reach the backend; ids already stored are dropped at write time |
//!
//! Implementations must be `Send + Sync` to be shared across ingestion
//! tasks.

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{EntryPage, IndexEntry, MatchResult};

/// Errors reported by a [`VectorStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The namespace or collection does not exist yet.
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),
    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),
    /// The backend returned data that could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Backend primitives for a namespace-scoped vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// All docIds stored under `namespace`.
    ///
    /// May fail with [`StoreError::NotFound`] for a namespace the backend
    /// has never seen.
    async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StoreError>;

    /// The subset of `ids` that is already stored.
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError>;

    /// Insert entries whose docId is not yet stored; returns how many were
    /// written. Entries whose docId already exists are left untouched.
    async fn insert_if_absent(&self, entries: &[IndexEntry]) -> Result<usize, StoreError>;

    /// Up to `top_k` entries of `namespace`, ascending cosine distance.
    async fn query(
        &self,
        vector: &[f32],
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, StoreError>;

    /// One 1-based page of stored entries across all namespaces.
    async fn list_page(&self, page: usize, limit: usize) -> Result<EntryPage, StoreError>;
}

/// Outcome of [`add_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Entries physically written.
    pub inserted: usize,
    /// Entries rejected before any backend call.
    pub invalid: usize,
    /// Entries dropped because their docId was already stored.
    pub duplicates: usize,
}

/// docIds already indexed in `namespace`.
///
/// A backend [`StoreError::NotFound`] is a first-time namespace and
/// yields an empty set. Other errors propagate.
pub async fn existing_ids_for_namespace<S: VectorStore + ?Sized>(
    store: &S,
    namespace: &str,
) -> Result<HashSet<String>, StoreError> {
    match store.list_ids(namespace).await {
        Ok(ids) => {
            tracing::debug!(namespace, count = ids.len(), "resolved existing ids");
            Ok(ids.into_iter().collect())
        }
        Err(StoreError::NotFound(what)) => {
            tracing::debug!(namespace, %what, "namespace not indexed yet");
            Ok(HashSet::new())
        }
        Err(e) => Err(e),
    }
}

/// Write a batch of entries, skipping malformed and already stored ones.
///
/// 1. Drop entries with an empty docId or an empty / non-finite embedding.
/// 2. Re-check which docIds exist right before the write and drop them
///    (and duplicates within the batch itself).
/// 3. Hand the rest to [`VectorStore::insert_if_absent`].
///
/// A failed re-check is logged and the write proceeds; the backend
/// primitive still refuses to overwrite stored ids.
pub async fn add_batch<S: VectorStore + ?Sized>(
    store: &S,
    entries: Vec<IndexEntry>,
) -> Result<BatchReport, StoreError> {
    let mut report = BatchReport::default();

    let mut valid = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.validation_error() {
            Some(reason) => {
                tracing::warn!(doc_id = %entry.doc_id, file = %entry.file, reason, "skipping invalid entry");
                report.invalid += 1;
            }
            None => valid.push(entry),
        }
    }

    if valid.is_empty() {
        tracing::info!("no valid entries to store");
        return Ok(report);
    }

    let ids: Vec<String> = valid.iter().map(|e| e.doc_id.clone()).collect();
    let stored = match store.existing_ids(&ids).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, "existence re-check failed, relying on insert-if-absent");
            HashSet::new()
        }
    };

    let mut seen = HashSet::new();
    let to_add: Vec<IndexEntry> = valid
        .into_iter()
        .filter(|e| !stored.contains(&e.doc_id) && seen.insert(e.doc_id.clone()))
        .collect();
    report.duplicates = ids.len() - to_add.len();

    if to_add.is_empty() {
        tracing::info!(duplicates = report.duplicates, "all entries already stored");
        return Ok(report);
    }

    report.inserted = store.insert_if_absent(&to_add).await?;
    report.duplicates += to_add.len() - report.inserted;
    tracing::info!(
        inserted = report.inserted,
        duplicates = report.duplicates,
        invalid = report.invalid,
        "stored batch"
    );
    Ok(report)
}
