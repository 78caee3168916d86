//! Core data models shared by the ingestion and query pipelines.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity;

/// Number of embedding components kept in [`EntryPreview::embedding`].
pub const EMBEDDING_PREVIEW_LEN: usize = 10;

/// A corpus namespace, `owner/project`.
///
/// Parsed from a slug such as `"acme/widgets"`. Segments past the second
/// are dropped so `"acme/widgets/tree/main"` and `"acme/widgets"` name the
/// same corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    owner: String,
    project: String,
    slug: String,
}

impl Namespace {
    /// Parse `owner/project[/...]`.
    ///
    /// Returns `None` when either the owner or the project is blank.
    pub fn parse(slug: &str) -> Option<Self> {
        let mut parts = slug.trim().trim_matches('/').split('/');
        let owner = parts.next()?.trim();
        let project = parts.next()?.trim();
        if owner.is_empty() || project.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            project: project.to_string(),
            slug: format!("{}/{}", owner, project),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn as_str(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug)
    }
}

/// A unit of indexing derived from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub namespace: String,
    pub path: String,
    /// `0` is the whole-file chunk; `N >= 1` is the N-th sub-unit.
    pub ordinal: u32,
    pub text: String,
    pub code: Option<String>,
    pub doc_id: String,
}

impl Chunk {
    pub fn new(
        namespace: &Namespace,
        path: &str,
        ordinal: u32,
        text: String,
        code: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.as_str().to_string(),
            path: path.to_string(),
            ordinal,
            text,
            code,
            doc_id: identity::doc_id(namespace.as_str(), path, ordinal),
        }
    }

    /// Attach an embedding, producing the persisted form.
    pub fn into_entry(self, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            doc_id: self.doc_id,
            namespace: self.namespace,
            file: self.path,
            chunk: self.text,
            code: self.code,
            embedding,
        }
    }
}

/// Persisted form of a [`Chunk`]: text, metadata and embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub doc_id: String,
    pub namespace: String,
    pub file: String,
    pub chunk: String,
    pub code: Option<String>,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Why this entry cannot be stored, if it cannot.
    pub fn validation_error(&self) -> Option<&'static str> {
        if self.doc_id.trim().is_empty() {
            Some("empty docId")
        } else if self.embedding.is_empty() {
            Some("empty embedding")
        } else if self.embedding.iter().any(|v| !v.is_finite()) {
            Some("non-numeric embedding component")
        } else {
            None
        }
    }
}

/// A similarity search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub file: String,
    #[serde(rename = "match")]
    pub text: String,
    pub code: Option<String>,
    #[serde(rename = "docId")]
    pub doc_id: String,
    /// Cosine distance (`1 - cosine similarity`); lower is closer.
    pub distance: f32,
}

/// A stored entry as shown by the inspection listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPreview {
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub file: String,
    #[serde(rename = "repo")]
    pub namespace: String,
    pub code: Option<String>,
    pub summary: String,
    /// The first [`EMBEDDING_PREVIEW_LEN`] components.
    pub embedding: Vec<f32>,
}

impl From<&IndexEntry> for EntryPreview {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            doc_id: entry.doc_id.clone(),
            file: entry.file.clone(),
            namespace: entry.namespace.clone(),
            code: entry.code.clone(),
            summary: entry.chunk.clone(),
            embedding: entry
                .embedding
                .iter()
                .take(EMBEDDING_PREVIEW_LEN)
                .copied()
                .collect(),
        }
    }
}

/// One page of stored entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPage {
    pub documents: Vec<EntryPreview>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// Zero-based row offset of a 1-based page.
pub fn page_offset(page: usize, limit: usize) -> usize {
    page.saturating_sub(1).saturating_mul(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_parse() {
        let ns = Namespace::parse("acme/widgets").unwrap();
        assert_eq!(ns.owner(), "acme");
        assert_eq!(ns.project(), "widgets");
        assert_eq!(ns.as_str(), "acme/widgets");
    }

    #[test]
    fn test_namespace_drops_extra_segments() {
        let ns = Namespace::parse("/acme/widgets/tree/main").unwrap();
        assert_eq!(ns.to_string(), "acme/widgets");
    }

    #[test]
    fn test_namespace_rejects_incomplete() {
        assert!(Namespace::parse("acme").is_none());
        assert!(Namespace::parse("acme/").is_none());
        assert!(Namespace::parse("").is_none());
        assert!(Namespace::parse(" /widgets").is_none());
    }

    #[test]
    fn test_validation_error() {
        let ns = Namespace::parse("acme/widgets").unwrap();
        let chunk = Chunk::new(&ns, "a.js", 0, "text".into(), None);
        assert_eq!(chunk.clone().into_entry(vec![0.1]).validation_error(), None);
        assert_eq!(
            chunk.clone().into_entry(vec![]).validation_error(),
            Some("empty embedding")
        );
        assert_eq!(
            chunk.into_entry(vec![f32::NAN]).validation_error(),
            Some("non-numeric embedding component")
        );
    }

    #[test]
    fn test_preview_truncates_embedding() {
        let ns = Namespace::parse("acme/widgets").unwrap();
        let entry = Chunk::new(&ns, "a.js", 0, "text".into(), None).into_entry(vec![1.0; 64]);
        let preview = EntryPreview::from(&entry);
        assert_eq!(preview.embedding.len(), EMBEDDING_PREVIEW_LEN);
        assert_eq!(preview.summary, "text");
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }
}
