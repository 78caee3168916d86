//! Content sources: where corpus files come from.
//!
//! - [`GitHubSource`]: git trees API for listings, raw host for content.
//! - [`LocalSource`]: a directory holding `<owner>/<project>/` trees.
//!
//! Listings are filtered through the configured include globs (by
//! default `js`, `ts`, `jsx`, `tsx`, `py` and `md` files) and sorted.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use repo_help_core::models::Namespace;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::SourceConfig;

/// Lists and fetches files of a namespace.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Paths of indexable files, relative to the corpus root.
    async fn list_files(&self, namespace: &Namespace) -> Result<Vec<String>>;

    /// Raw text of one file.
    async fn fetch(&self, namespace: &Namespace, path: &str) -> Result<String>;
}

/// Build the source named by `config.kind`.
pub fn create_source(config: &SourceConfig) -> Result<Arc<dyn ContentSource>> {
    match config.kind.as_str() {
        "github" => Ok(Arc::new(GitHubSource::new(config)?)),
        "local" => {
            let root = config
                .root
                .clone()
                .ok_or_else(|| anyhow!("source.root required for local source"))?;
            Ok(Arc::new(LocalSource::new(root, &config.include_globs)?))
        }
        other => bail!("Unknown source kind: {}", other),
    }
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

// ============ GitHub ============

/// Reads public (or token-authorized) repositories from GitHub.
///
/// `GITHUB_TOKEN`, when set, is sent as a bearer token to raise rate
/// limits and reach private repositories.
pub struct GitHubSource {
    client: reqwest::Client,
    api_url: String,
    raw_url: String,
    branch: String,
    include: GlobSet,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GitHubSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repo-help/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
            branch: config.branch.clone(),
            include: build_globset(&config.include_globs)?,
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ContentSource for GitHubSource {
    async fn list_files(&self, namespace: &Namespace) -> Result<Vec<String>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_url,
            namespace.owner(),
            namespace.project(),
            self.branch
        );
        let response = self.request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub tree listing for {} failed {}: {}", namespace, status, body);
        }
        let tree: TreeResponse = response.json().await?;
        if tree.truncated {
            tracing::warn!(%namespace, "GitHub tree listing truncated");
        }
        let files = filter_tree(tree.tree, &self.include);
        tracing::info!(%namespace, files = files.len(), "listed repository files");
        Ok(files)
    }

    async fn fetch(&self, namespace: &Namespace, path: &str) -> Result<String> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_url,
            namespace.owner(),
            namespace.project(),
            self.branch,
            path
        );
        let response = self.request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("GitHub fetch of {} failed: {}", path, status);
        }
        Ok(response.text().await?)
    }
}

fn filter_tree(entries: Vec<TreeEntry>, include: &GlobSet) -> Vec<String> {
    let mut files: Vec<String> = entries
        .into_iter()
        .filter(|e| e.kind == "blob" && include.is_match(&e.path))
        .map(|e| e.path)
        .collect();
    files.sort();
    files
}

// ============ Local ============

/// Reads `<root>/<owner>/<project>/**` from disk.
pub struct LocalSource {
    root: PathBuf,
    include: GlobSet,
}

impl LocalSource {
    pub fn new(root: PathBuf, include_globs: &[String]) -> Result<Self> {
        Ok(Self {
            root,
            include: build_globset(include_globs)?,
        })
    }

    fn corpus_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(namespace.owner()).join(namespace.project())
    }
}

#[async_trait]
impl ContentSource for LocalSource {
    async fn list_files(&self, namespace: &Namespace) -> Result<Vec<String>> {
        let dir = self.corpus_dir(namespace);
        if !dir.is_dir() {
            bail!("No local corpus for {} at {}", namespace, dir.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&dir).unwrap_or(entry.path());
            let rel_str = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if rel_str.starts_with(".git/") || !self.include.is_match(&rel_str) {
                continue;
            }
            files.push(rel_str);
        }
        files.sort();
        Ok(files)
    }

    async fn fetch(&self, namespace: &Namespace, path: &str) -> Result<String> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Refusing to read path outside the corpus: {}", path);
        }
        let full = self.corpus_dir(namespace).join(relative);
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }
}
