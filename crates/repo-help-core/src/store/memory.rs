//! In-memory [`VectorStore`] for tests and single-process runs.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`, indexed by docId.
//! Search is brute-force cosine distance over the namespace's entries.
//! Insert-if-absent is atomic because the id check and the push happen
//! under one write lock.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{page_offset, EntryPage, EntryPreview, IndexEntry, MatchResult};

use super::{StoreError, VectorStore};

#[derive(Default)]
struct Inner {
    entries: Vec<IndexEntry>,
    by_id: HashMap<String, usize>,
}

/// In-memory store; entries are kept in insertion order.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored entry.
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.read().entries.clone()
    }

    // A poisoned lock only means a panicking reader/writer; the data is
    // append-only so it is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.read();
        let ids: Vec<String> = inner
            .entries
            .iter()
            .filter(|e| e.namespace == namespace)
            .map(|e| e.doc_id.clone())
            .collect();
        if ids.is_empty() {
            return Err(StoreError::NotFound(format!("namespace {}", namespace)));
        }
        Ok(ids)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        let inner = self.read();
        Ok(ids
            .iter()
            .filter(|id| inner.by_id.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_if_absent(&self, entries: &[IndexEntry]) -> Result<usize, StoreError> {
        let mut inner = self.write();
        let mut inserted = 0;
        for entry in entries {
            if inner.by_id.contains_key(&entry.doc_id) {
                continue;
            }
            let index = inner.entries.len();
            inner.by_id.insert(entry.doc_id.clone(), index);
            inner.entries.push(entry.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn query(
        &self,
        vector: &[f32],
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, StoreError> {
        let inner = self.read();
        let mut matches: Vec<MatchResult> = inner
            .entries
            .iter()
            .filter(|e| e.namespace == namespace && e.embedding.len() == vector.len())
            .map(|e| MatchResult {
                file: e.file.clone(),
                text: e.chunk.clone(),
                code: e.code.clone(),
                doc_id: e.doc_id.clone(),
                distance: cosine_distance(vector, &e.embedding),
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn list_page(&self, page: usize, limit: usize) -> Result<EntryPage, StoreError> {
        let inner = self.read();
        let documents: Vec<EntryPreview> = inner
            .entries
            .iter()
            .skip(page_offset(page, limit))
            .take(limit)
            .map(EntryPreview::from)
            .collect();
        Ok(EntryPage {
            documents,
            total: inner.entries.len(),
            page,
            limit,
        })
    }
}
