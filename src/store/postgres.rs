//! Postgres + pgvector [`VectorStore`] (Neon or any Postgres with the
//! `vector` extension available).
//!
//! Vectors are sent as pgvector text literals (`[0.1,0.2,...]`) and cast
//! with `::vector`, so no pgvector client type is needed. Search uses the
//! cosine distance operator `<=>` and reports `1 - distance` as the score.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use super::{check_lengths, VectorStore};
use crate::config::VectorStoreConfig;
use crate::error::RagError;
use crate::models::{Document, Embedding, ScoredDocument};

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
}

impl PgVectorStore {
    /// Connect, then create the extension and table if they are missing.
    ///
    /// `dims` sizes the `vector(dims)` column of a new table; an existing
    /// table is left as it is.
    pub async fn connect(config: &VectorStoreConfig, dims: usize) -> Result<Self> {
        let url = config
            .connection_string
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RagError::MissingConfig("vector_store.connection_string"))?;
        super::validate_table_name(&config.table_name)?;
        if dims == 0 {
            return Err(RagError::invalid("embedding dimensionality must be > 0").into());
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .context("Failed to connect to Postgres")?;

        let store = Self {
            pool,
            table: config.table_name.clone(),
        };
        store.create_table(dims).await?;
        Ok(store)
    }

    async fn create_table(&self, dims: usize) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .context("Failed to enable pgvector extension")?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                embedding vector({}) NOT NULL
            )
            "#,
            self.table, dims
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Render a vector as a pgvector literal.
pub fn to_vector_literal(vec: &[f32]) -> String {
    let parts: Vec<String> = vec.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn name(&self) -> &str {
        "neonpg"
    }

    async fn add_documents(
        &self,
        documents: &[Document],
        embeddings: &[Embedding],
    ) -> Result<usize> {
        check_lengths(documents, embeddings)?;
        let sql = format!(
            "INSERT INTO {} (id, content, metadata, embedding) VALUES ($1, $2, $3, $4::vector)",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        for (document, vector) in documents.iter().zip(embeddings) {
            sqlx::query(&sql)
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&document.page_content)
                .bind(sqlx::types::Json(&document.metadata))
                .bind(to_vector_literal(vector))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(documents.len())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let sql = format!(
            r#"
            SELECT content, metadata, (1 - (embedding <=> $1::vector))::real AS score
            FROM {}
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#,
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(to_vector_literal(query))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let metadata: sqlx::types::Json<serde_json::Value> = row.get("metadata");
                ScoredDocument {
                    document: Document::with_metadata(
                        row.get::<String, _>("content"),
                        metadata.0,
                    ),
                    score: row.get::<f32, _>("score"),
                }
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
