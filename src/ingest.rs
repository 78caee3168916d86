//! Incremental ingestion.
//!
//! Turns a namespace's file list into stored [`IndexEntry`] rows:
//!
//! ```text
//! resolve existing ids ─► skip indexed files ─► fetch ─► summarize ─► embed ─► add_batch
//!                                              └──── up to C files at once ────┘
//! ```
//!
//! A file counts as indexed as soon as any docId of that file exists, so
//! re-running ingestion over an unchanged listing fetches nothing. Unit
//! failures (one fetch, one summary, one embedding) are logged and land
//! in [`IngestReport::failed`]; the run itself only fails on an empty
//! file list, a store lookup failure or a batch write failure. A path
//! listed more than once is processed once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use repo_help_core::identity;
use repo_help_core::models::{IndexEntry, Namespace};
use repo_help_core::store::{add_batch, existing_ids_for_namespace, VectorStore};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::embedding::RetryingEmbedder;
use crate::error::{Error, Result};
use crate::source::ContentSource;
use crate::summarize::Summarizer;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Entries written by the final batch.
    pub stored: usize,
    /// Files left alone because they were already indexed.
    pub skipped: usize,
    /// Files with at least one unit that could not be processed.
    pub failed: Vec<String>,
    /// Files never dispatched because the run was cancelled.
    pub cancelled: Vec<String>,
}

/// What a single file task hands back to the collector.
struct FileOutcome {
    path: String,
    entries: Vec<IndexEntry>,
    failed: bool,
}

/// Runs ingestion over a content source into a vector store.
#[derive(Clone)]
pub struct Ingestor {
    source: Arc<dyn ContentSource>,
    summarizer: Arc<dyn Summarizer>,
    embedder: RetryingEmbedder,
    store: Arc<dyn VectorStore>,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn ContentSource>,
        summarizer: Arc<dyn Summarizer>,
        embedder: RetryingEmbedder,
        store: Arc<dyn VectorStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            summarizer,
            embedder,
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Ingest `files` of `namespace` to completion.
    pub async fn ingest(&self, namespace: &Namespace, files: &[String]) -> Result<IngestReport> {
        self.ingest_with_cancel(namespace, files, CancellationToken::new())
            .await
    }

    /// Ingest `files`, stopping dispatch when `cancel` fires.
    ///
    /// Files already running when the token fires finish and their
    /// entries are committed; the rest are reported as cancelled.
    pub async fn ingest_with_cancel(
        &self,
        namespace: &Namespace,
        files: &[String],
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        if files.is_empty() {
            return Err(Error::EmptyFileList);
        }

        let existing =
            Arc::new(existing_ids_for_namespace(self.store.as_ref(), namespace.as_str()).await?);
        let mut report = IngestReport::default();

        let mut pending = Vec::new();
        let mut seen = HashSet::with_capacity(files.len());
        for path in files {
            if !seen.insert(path.as_str()) {
                tracing::debug!(%namespace, path = %path, "duplicate path in listing, ignoring");
                continue;
            }
            let indexed = existing
                .iter()
                .any(|id| identity::belongs_to_file(id, namespace.as_str(), path));
            if indexed {
                tracing::debug!(%namespace, path = %path, "already indexed, skipping");
                report.skipped += 1;
            } else {
                pending.push(path.clone());
            }
        }

        tracing::info!(
            %namespace,
            files = files.len(),
            skipped = report.skipped,
            to_process = pending.len(),
            concurrency = self.concurrency,
            "starting ingestion"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<FileOutcome>();
        let mut tasks = JoinSet::new();
        let mut dispatched = Vec::with_capacity(pending.len());

        let mut queue = pending.into_iter();
        while let Some(path) = queue.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.cancelled.push(path);
                report.cancelled.extend(queue.by_ref());
                break;
            };

            dispatched.push(path.clone());
            let worker = self.clone();
            let namespace = namespace.clone();
            let existing = Arc::clone(&existing);
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = worker.process_file(&namespace, path, &existing).await;
                // The collector outlives every task.
                let _ = tx.send(outcome);
                drop(permit);
            });
        }
        drop(tx);

        if !report.cancelled.is_empty() {
            tracing::warn!(
                %namespace,
                cancelled = report.cancelled.len(),
                "ingestion cancelled, draining running files"
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(%namespace, error = %e, "file task aborted");
            }
        }

        let mut outcomes = HashMap::with_capacity(dispatched.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.insert(outcome.path.clone(), outcome);
        }

        let mut entries = Vec::new();
        for path in dispatched {
            match outcomes.remove(&path) {
                Some(outcome) => {
                    if outcome.failed {
                        report.failed.push(path);
                    }
                    entries.extend(outcome.entries);
                }
                None => report.failed.push(path),
            }
        }

        if !entries.is_empty() {
            let batch = add_batch(self.store.as_ref(), entries).await?;
            report.stored = batch.inserted;
        }

        tracing::info!(
            %namespace,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Fetch, summarize and embed one file.
    async fn process_file(
        &self,
        namespace: &Namespace,
        path: String,
        existing: &HashSet<String>,
    ) -> FileOutcome {
        let mut outcome = FileOutcome {
            path,
            entries: Vec::new(),
            failed: false,
        };
        let path = outcome.path.as_str();

        let raw = match self.source.fetch(namespace, path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%namespace, path, error = %e, "fetch failed");
                outcome.failed = true;
                return outcome;
            }
        };

        let summary = match self.summarizer.summarize(path, &raw).await {
            Ok(summary) if !summary.is_empty() => summary,
            Ok(_) => {
                tracing::warn!(%namespace, path, "summary produced no chunks");
                outcome.failed = true;
                return outcome;
            }
            Err(e) => {
                tracing::warn!(%namespace, path, error = %e, "summarize failed");
                outcome.failed = true;
                return outcome;
            }
        };

        let mut entries = Vec::new();
        let mut failed = false;
        for chunk in summary.into_chunks(namespace, path) {
            if existing.contains(&chunk.doc_id) {
                continue;
            }
            match self.embedder.embed(&chunk.text).await {
                Ok(vector) => entries.push(chunk.into_entry(vector)),
                Err(e) => {
                    tracing::warn!(%namespace, doc_id = %chunk.doc_id, error = %e, "dropping chunk");
                    failed = true;
                }
            }
        }

        tracing::debug!(%namespace, path, chunks = entries.len(), "file processed");
        outcome.entries = entries;
        outcome.failed = failed;
        outcome
    }
}
