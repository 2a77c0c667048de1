//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the document
//! text and its JSON metadata. Search loads every row and ranks by cosine
//! similarity in Rust, which is fine for local corpora of a few thousand
//! chunks.
//!
//! `connection_string` is either a `sqlite:` URL or a plain file path; the
//! file and its parent directories are created if missing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use super::{check_lengths, nearest, VectorStore};
use crate::config::VectorStoreConfig;
use crate::error::RagError;
use crate::models::{Document, Embedding, ScoredDocument};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteVectorStore {
    /// Open (or create) the database and make sure the table exists.
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let target = config
            .connection_string
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RagError::MissingConfig("vector_store.connection_string"))?;
        super::validate_table_name(&config.table_name)?;

        let url = if target.starts_with("sqlite:") {
            target.to_string()
        } else {
            if let Some(parent) = Path::new(target).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory: {}", parent.display())
                    })?;
                }
            }
            format!("sqlite:{}", target)
        };

        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            table: config.table_name.clone(),
        };
        store.create_table().await?;
        Ok(store)
    }

    async fn create_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{{}}',
                embedding BLOB NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Encode a vector as little-endian bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add_documents(
        &self,
        documents: &[Document],
        embeddings: &[Embedding],
    ) -> Result<usize> {
        check_lengths(documents, embeddings)?;
        let sql = format!(
            "INSERT INTO {} (id, content, metadata, embedding) VALUES (?, ?, ?, ?)",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        for (document, vector) in documents.iter().zip(embeddings) {
            sqlx::query(&sql)
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&document.page_content)
                .bind(document.metadata.to_string())
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(documents.len())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT content, metadata, embedding FROM {}",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw: String = row.get("metadata");
            let metadata: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("Corrupt metadata in table {}: {}", self.table, raw))?;
            let blob: Vec<u8> = row.get("embedding");
            stored.push((
                Document::with_metadata(row.get::<String, _>("content"), metadata),
                blob_to_vec(&blob),
            ));
        }

        nearest(
            query,
            stored.iter().map(|(doc, vec)| (doc, vec.as_slice())),
            k,
        )
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(path: &Path) -> VectorStoreConfig {
        VectorStoreConfig {
            provider: "sqlite".into(),
            connection_string: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_blob_round_trip() {
        let v = vec![1.0f32, -2.5, 3.125];
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("rag.sqlite");

        {
            let store = SqliteVectorStore::connect(&config(&path)).await.unwrap();
            let docs = vec![
                Document::with_metadata("alpha", serde_json::json!({"source": "a.txt"})),
                Document::new("beta"),
            ];
            let n = store
                .add_documents(&docs, &[vec![1.0, 0.0], vec![0.0, 1.0]])
                .await
                .unwrap();
            assert_eq!(n, 2);
        }

        let store = SqliteVectorStore::connect(&config(&path)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.similarity_search(&[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.page_content, "alpha");
        assert_eq!(hits[0].document.metadata["source"], "a.txt");
    }

    #[tokio::test]
    async fn test_custom_table_name() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp.path().join("rag.sqlite"));
        cfg.table_name = "notes_vectors".into();
        let store = SqliteVectorStore::connect(&cfg).await.unwrap();
        store
            .add_documents(&[Document::new("x")], &[vec![1.0]])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_with_other_dimensionality_fails() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::connect(&config(&tmp.path().join("rag.sqlite")))
            .await
            .unwrap();
        store
            .add_documents(
                &[Document::new("a"), Document::new("b")],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let err = store
            .similarity_search(&[1.0, 0.0, 0.0], 5)
            .await
            .unwrap_err();
        assert!(crate::error::find_rag_error(&err).unwrap().is_config());
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::connect(&config(&tmp.path().join("rag.sqlite")))
            .await
            .unwrap();
        sqlx::query(&format!(
            "INSERT INTO {} (id, content, metadata, embedding) VALUES (?, ?, ?, ?)",
            store.table
        ))
        .bind("broken")
        .bind("text")
        .bind("{not json")
        .bind(vec_to_blob(&[1.0, 0.0]))
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.similarity_search(&[1.0, 0.0], 5).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Corrupt metadata"));
    }

    #[tokio::test]
    async fn test_missing_path() {
        let cfg = VectorStoreConfig {
            provider: "sqlite".into(),
            connection_string: None,
            ..Default::default()
        };
        let err = SqliteVectorStore::connect(&cfg).await.err().unwrap();
        assert!(matches!(
            crate::error::find_rag_error(&err),
            Some(RagError::MissingConfig("vector_store.connection_string"))
        ));
    }
}
