//! Chroma-backed [`VectorStore`].
//!
//! Talks to a Chroma server over its v1 HTTP API. Every namespace shares
//! one collection (default `repo-help`, cosine space); entries carry
//! `repo`, `file` and optionally `code` metadata and the chunk summary as
//! the document text. Namespace scoping is a `where` filter on `repo`.
//!
//! Chroma has no conditional insert, so [`VectorStore::insert_if_absent`]
//! is a lookup followed by an add. Two writers racing on the same docId
//! can both pass the lookup; use the SQLite backend when ingestion runs
//! from several processes at once.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use repo_help_core::models::{EntryPage, EntryPreview, IndexEntry, MatchResult};
use repo_help_core::store::{StoreError, VectorStore};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use crate::config::StoreConfig;

pub struct ChromaStore {
    client: reqwest::Client,
    url: String,
    collection: String,
    collection_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Map<String, Value>>>>,
    #[serde(default)]
    embeddings: Option<Vec<Option<Vec<f32>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

impl ChromaStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            collection_id: OnceCell::new(),
        })
    }

    /// Resolve the collection id, creating the collection on first use.
    async fn collection_id(&self) -> Result<&str, StoreError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let body = json!({
                    "name": self.collection,
                    "metadata": { "hnsw:space": "cosine" },
                    "get_or_create": true,
                });
                let created: CollectionResponse = self
                    .send(format!("{}/api/v1/collections", self.url), &body)
                    .await?;
                tracing::debug!(collection = %self.collection, id = %created.id, "resolved chroma collection");
                Ok::<_, StoreError>(created.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn post<T: DeserializeOwned>(&self, op: &str, body: &Value) -> Result<T, StoreError> {
        let id = self.collection_id().await?;
        self.send(
            format!("{}/api/v1/collections/{}/{}", self.url, id, op),
            body,
        )
        .await
    }

    async fn send<T: DeserializeOwned>(&self, url: String, body: &Value) -> Result<T, StoreError> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::NotFound(body));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Backend(format!("chroma {}: {}", status, body)));
    }
    response
        .json()
        .await
        .map_err(|e| StoreError::Malformed(e.to_string()))
}

fn metadata_for(entry: &IndexEntry) -> Value {
    let mut meta = Map::new();
    meta.insert("repo".into(), Value::String(entry.namespace.clone()));
    meta.insert("file".into(), Value::String(entry.file.clone()));
    if let Some(code) = &entry.code {
        meta.insert("code".into(), Value::String(code.clone()));
    }
    Value::Object(meta)
}

fn meta_str(meta: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    meta.and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_query(response: QueryResponse) -> Result<Vec<MatchResult>, StoreError> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .ok_or_else(|| StoreError::Malformed("query response without distances".into()))?;

    if distances.len() != ids.len() {
        return Err(StoreError::Malformed(format!(
            "{} ids but {} distances",
            ids.len(),
            distances.len()
        )));
    }

    Ok(ids
        .into_iter()
        .enumerate()
        .map(|(i, doc_id)| {
            let meta = metadatas.get(i).and_then(Option::as_ref);
            MatchResult {
                file: meta_str(meta, "file").unwrap_or_default(),
                text: documents.get(i).cloned().flatten().unwrap_or_default(),
                code: meta_str(meta, "code"),
                doc_id,
                distance: distances[i],
            }
        })
        .collect())
}

fn parse_entries(response: GetResponse) -> Vec<IndexEntry> {
    let documents = response.documents.unwrap_or_default();
    let metadatas = response.metadatas.unwrap_or_default();
    let embeddings = response.embeddings.unwrap_or_default();

    response
        .ids
        .into_iter()
        .enumerate()
        .map(|(i, doc_id)| {
            let meta = metadatas.get(i).and_then(Option::as_ref);
            IndexEntry {
                doc_id,
                namespace: meta_str(meta, "repo").unwrap_or_default(),
                file: meta_str(meta, "file").unwrap_or_default(),
                chunk: documents.get(i).cloned().flatten().unwrap_or_default(),
                code: meta_str(meta, "code"),
                embedding: embeddings.get(i).cloned().flatten().unwrap_or_default(),
            }
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let body = json!({
            "where": { "repo": { "$eq": namespace } },
            "include": [],
        });
        let response: GetResponse = self.post("get", &body).await?;
        Ok(response.ids)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let body = json!({ "ids": ids, "include": [] });
        let response: GetResponse = self.post("get", &body).await?;
        Ok(response.ids.into_iter().collect())
    }

    async fn insert_if_absent(&self, entries: &[IndexEntry]) -> Result<usize, StoreError> {
        let ids: Vec<String> = entries.iter().map(|e| e.doc_id.clone()).collect();
        let present = self.existing_ids(&ids).await?;
        let fresh: Vec<&IndexEntry> = entries
            .iter()
            .filter(|e| !present.contains(&e.doc_id))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let body = json!({
            "ids": fresh.iter().map(|e| &e.doc_id).collect::<Vec<_>>(),
            "embeddings": fresh.iter().map(|e| &e.embedding).collect::<Vec<_>>(),
            "documents": fresh.iter().map(|e| &e.chunk).collect::<Vec<_>>(),
            "metadatas": fresh.iter().map(|e| metadata_for(e)).collect::<Vec<_>>(),
        });
        let _: Value = self.post("add", &body).await?;
        Ok(fresh.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, StoreError> {
        let body = json!({
            "query_embeddings": [vector],
            "n_results": top_k,
            "where": { "repo": { "$eq": namespace } },
            "include": ["documents", "metadatas", "distances"],
        });
        let response: QueryResponse = self.post("query", &body).await?;
        parse_query(response)
    }

    async fn list_page(&self, page: usize, limit: usize) -> Result<EntryPage, StoreError> {
        let id = self.collection_id().await?;
        let response = self
            .client
            .get(format!("{}/api/v1/collections/{}/count", self.url, id))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let total: usize = read_json(response).await?;

        let body = json!({
            "limit": limit,
            "offset": repo_help_core::models::page_offset(page, limit),
            "include": ["documents", "metadatas", "embeddings"],
        });
        let response: GetResponse = self.post("get", &body).await?;
        let documents = parse_entries(response)
            .iter()
            .map(EntryPreview::from)
            .collect();

        Ok(EntryPage {
            documents,
            total,
            page,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_reads_first_result_set() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["acme/widgets::a.js", "acme/widgets::b.js::unit-1"]],
            "documents": [["Parses config.", "Starts server."]],
            "metadatas": [[
                { "repo": "acme/widgets", "file": "a.js" },
                { "repo": "acme/widgets", "file": "b.js", "code": "listen(3000)" }
            ]],
            "distances": [[0.12, 0.4]]
        }))
        .unwrap();

        let results = parse_query(response).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file, "a.js");
        assert_eq!(results[0].text, "Parses config.");
        assert_eq!(results[0].code, None);
        assert_eq!(results[1].doc_id, "acme/widgets::b.js::unit-1");
        assert_eq!(results[1].code.as_deref(), Some("listen(3000)"));
        assert!((results[1].distance - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_parse_query_without_distances_is_malformed() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["x"]],
            "documents": [["doc"]]
        }))
        .unwrap();
        assert!(matches!(parse_query(response), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_parse_query_empty() {
        let response: QueryResponse =
            serde_json::from_value(json!({ "ids": [[]], "distances": [[]] })).unwrap();
        assert!(parse_query(response).unwrap().is_empty());
    }

    #[test]
    fn test_parse_entries_tolerates_missing_columns() {
        let response: GetResponse = serde_json::from_value(json!({
            "ids": ["acme/widgets::a.js"],
            "documents": [null],
            "metadatas": [{ "repo": "acme/widgets", "file": "a.js" }],
            "embeddings": null
        }))
        .unwrap();
        let entries = parse_entries(response);
        assert_eq!(entries[0].namespace, "acme/widgets");
        assert_eq!(entries[0].chunk, "");
        assert!(entries[0].embedding.is_empty());
    }

    #[test]
    fn test_metadata_omits_missing_code() {
        let entry = IndexEntry {
            doc_id: "acme/widgets::a.js".into(),
            namespace: "acme/widgets".into(),
            file: "a.js".into(),
            chunk: "summary".into(),
            code: None,
            embedding: vec![1.0],
        };
        assert_eq!(
            metadata_for(&entry),
            json!({ "repo": "acme/widgets", "file": "a.js" })
        );
    }
}
