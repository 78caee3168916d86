//! In-process fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use repo_help::embedding::{RetryPolicy, RetryingEmbedder};
use repo_help::source::ContentSource;
use repo_help::summarize::Summarizer;
use repo_help_core::embedding::Embedder;
use repo_help_core::models::Namespace;
use repo_help_core::summary::{Summary, SummaryChunk};
use tokio_util::sync::CancellationToken;

// ─── Source ─────────────────────────────────────────────────────────

/// Serves files from a map keyed by namespace, recording every fetch.
#[derive(Default)]
pub struct MapSource {
    files: BTreeMap<String, BTreeMap<String, String>>,
    fetches: Mutex<Vec<String>>,
    broken: HashSet<String>,
    delay: Option<Duration>,
    cancel_on_fetch: Option<CancellationToken>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, namespace: &str, path: &str, content: &str) -> Self {
        self.files
            .entry(namespace.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Fetching `path` fails.
    pub fn with_broken(mut self, path: &str) -> Self {
        self.broken.insert(path.to_string());
        self
    }

    /// Every fetch sleeps for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The first fetch cancels `token`.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(token);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for MapSource {
    async fn list_files(&self, namespace: &Namespace) -> Result<Vec<String>> {
        match self.files.get(namespace.as_str()) {
            Some(files) => Ok(files.keys().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch(&self, namespace: &Namespace, path: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.fetches
            .lock()
            .unwrap()
            .push(format!("{}::{}", namespace, path));

        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.broken.contains(path) {
            bail!("connection reset while fetching {}", path);
        }
        match self.files.get(namespace.as_str()).and_then(|f| f.get(path)) {
            Some(content) => Ok(content.clone()),
            None => bail!("404 {}", path),
        }
    }
}

// ─── Summarizers ────────────────────────────────────────────────────

/// One chunk per file: the raw content.
pub struct WholeFile;

#[async_trait]
impl Summarizer for WholeFile {
    async fn summarize(&self, _path: &str, raw: &str) -> Result<Summary> {
        Ok(Summary::new(vec![SummaryChunk::text(raw)]))
    }
}

/// One chunk per non-empty line; lines after `code:` become the code.
pub struct PerLine;

#[async_trait]
impl Summarizer for PerLine {
    async fn summarize(&self, _path: &str, raw: &str) -> Result<Summary> {
        Ok(Summary::new(
            raw.lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| match l.split_once("code:") {
                    Some((text, code)) => SummaryChunk::with_code(text.trim(), code.trim()),
                    None => SummaryChunk::text(l.trim()),
                })
                .collect(),
        ))
    }
}

/// Panics on files whose content contains `"panic"`.
pub struct Panicky;

#[async_trait]
impl Summarizer for Panicky {
    async fn summarize(&self, path: &str, raw: &str) -> Result<Summary> {
        if raw.contains("panic") {
            panic!("summarizer blew up on {}", path);
        }
        Ok(Summary::new(vec![SummaryChunk::text(raw)]))
    }
}

// ─── Embedders ──────────────────────────────────────────────────────

const VOCABULARY: &[&str] = &[
    "login", "password", "cart", "checkout", "search", "index", "widget", "gadget", "server",
];

/// Bag-of-words over a tiny vocabulary, plus a constant component so
/// no vector is ever zero.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = VOCABULARY
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect();
    vector.push(0.1);
    vector
}

/// Deterministic keyword embedder.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keyword_vector(text))
    }
}

/// Fails a scripted number of times per text containing a marker.
///
/// `failures[marker] = n` fails the first `n` calls for matching texts;
/// `usize::MAX` fails forever. Successful calls return the keyword
/// vector with its last component set to the attempt number.
pub struct ScriptedEmbedder {
    failures: HashMap<String, usize>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedEmbedder {
    pub fn new(failures: &[(&str, usize)]) -> Self {
        Self {
            failures: failures
                .iter()
                .map(|(marker, n)| (marker.to_string(), *n))
                .collect(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempts_for(&self, marker: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(marker)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let marker = self
            .failures
            .keys()
            .find(|m| text.contains(m.as_str()))
            .cloned();
        let Some(marker) = marker else {
            return Ok(keyword_vector(text));
        };

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(marker.clone()).or_insert(0);
            *n += 1;
            *n
        };
        if attempt <= self.failures[&marker] {
            bail!("scripted failure {} for {}", attempt, marker);
        }
        let mut vector = keyword_vector(text);
        if let Some(last) = vector.last_mut() {
            *last = attempt as f32;
        }
        Ok(vector)
    }
}

/// Retry wrapper with a 1 ms backoff unit.
pub fn fast_retry(inner: Arc<dyn Embedder>) -> RetryingEmbedder {
    RetryingEmbedder::new(
        inner,
        RetryPolicy {
            max_attempts: 3,
            unit: Duration::from_millis(1),
        },
    )
}

pub fn ns(slug: &str) -> Namespace {
    Namespace::parse(slug).unwrap()
}

pub fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
