//! SQLite-backed [`VectorStore`].
//!
//! One row per chunk in the `entries` table; embeddings are stored as
//! little-endian `f32` blobs. Search loads the namespace's vectors and
//! ranks them by cosine distance in process, which is plenty for the
//! corpus sizes this service indexes.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use repo_help_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use repo_help_core::models::{page_offset, EntryPage, EntryPreview, IndexEntry, MatchResult};
use repo_help_core::store::{StoreError, VectorStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        migrate(&pool).await?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self { pool })
    }
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            doc_id TEXT PRIMARY KEY,
            namespace TEXT NOT NULL,
            file TEXT NOT NULL,
            chunk TEXT NOT NULL,
            code TEXT,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_namespace ON entries(namespace)")
        .execute(pool)
        .await?;

    Ok(())
}

fn backend(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(err.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT doc_id FROM entries WHERE namespace = ? ORDER BY rowid")
                .bind(namespace)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        Ok(ids)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        let mut found = HashSet::new();
        // Stay well under SQLite's bound-parameter limit.
        for batch in ids.chunks(500) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT doc_id FROM entries WHERE doc_id IN ({})",
                placeholders
            );
            let mut query = sqlx::query_scalar::<_, String>(&sql);
            for id in batch {
                query = query.bind(id);
            }
            found.extend(query.fetch_all(&self.pool).await.map_err(backend)?);
        }
        Ok(found)
    }

    async fn insert_if_absent(&self, entries: &[IndexEntry]) -> Result<usize, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut inserted = 0usize;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO entries (doc_id, namespace, file, chunk, code, embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(doc_id) DO NOTHING
                "#,
            )
            .bind(&entry.doc_id)
            .bind(&entry.namespace)
            .bind(&entry.file)
            .bind(&entry.chunk)
            .bind(&entry.code)
            .bind(vec_to_blob(&entry.embedding))
            .bind(entry.embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(backend)?;
        Ok(inserted)
    }

    async fn query(
        &self,
        vector: &[f32],
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc_id, file, chunk, code, embedding FROM entries WHERE namespace = ?",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(backend)?;
            let embedding = blob_to_vec(&blob);
            if embedding.len() != vector.len() {
                continue;
            }
            matches.push(MatchResult {
                file: row.try_get("file").map_err(backend)?,
                text: row.try_get("chunk").map_err(backend)?,
                code: row.try_get("code").map_err(backend)?,
                doc_id: row.try_get("doc_id").map_err(backend)?,
                distance: cosine_distance(vector, &embedding),
            });
        }

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn list_page(&self, page: usize, limit: usize) -> Result<EntryPage, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let rows = sqlx::query(
            r#"
            SELECT doc_id, namespace, file, chunk, code, embedding
            FROM entries
            ORDER BY rowid
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(page_offset(page, limit) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(backend)?;
            let entry = IndexEntry {
                doc_id: row.try_get("doc_id").map_err(backend)?,
                namespace: row.try_get("namespace").map_err(backend)?,
                file: row.try_get("file").map_err(backend)?,
                chunk: row.try_get("chunk").map_err(backend)?,
                code: row.try_get("code").map_err(backend)?,
                embedding: blob_to_vec(&blob),
            };
            documents.push(EntryPreview::from(&entry));
        }

        Ok(EntryPage {
            documents,
            total: total as usize,
            page,
            limit,
        })
    }
}
