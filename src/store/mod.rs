//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers everything the pipeline needs from a
//! store: persist documents with their vectors and run a similarity query.
//! Backends:
//!
//! | Provider id | Backend |
//! |-------------|---------|
//! | `neonpg`, `postgres` | [`PgVectorStore`] (Postgres + pgvector, e.g. Neon) |
//! | `sqlite` | [`SqliteVectorStore`] (local file, brute-force cosine) |
//! | `memory` | [`InMemoryVectorStore`] |
//!
//! [`VectorStoreRegistry::connect`] opens a store with
//! [`retry_connect`](crate::retry::retry_connect): connecting and creating
//! the table is attempted `connect_attempts` times with a fixed delay.

pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use memory::InMemoryVectorStore;
pub use postgres::PgVectorStore;
pub use sqlite::SqliteVectorStore;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::VectorStoreConfig;
use crate::error::RagError;
use crate::models::{Document, Embedding, ScoredDocument};
use crate::retry::retry_connect;
use crate::similarity::{check_dims, cosine_similarity};

/// Abstract storage backend for document embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs (e.g. `"neonpg"`).
    fn name(&self) -> &str;

    /// Store documents with their embeddings. Returns the number stored.
    ///
    /// `documents` and `embeddings` must have the same length.
    async fn add_documents(&self, documents: &[Document], embeddings: &[Embedding])
        -> Result<usize>;

    /// The `k` stored documents closest to `query`, best first.
    ///
    /// Scores are cosine similarities.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;
}

pub(crate) fn check_lengths(documents: &[Document], embeddings: &[Embedding]) -> Result<()> {
    if documents.len() != embeddings.len() {
        anyhow::bail!(
            "got {} documents but {} embeddings",
            documents.len(),
            embeddings.len()
        );
    }
    Ok(())
}

/// Brute-force k nearest neighbours by cosine similarity, best first.
///
/// Fails on the first stored vector whose length differs from the query's.
pub(crate) fn nearest<'a>(
    query: &[f32],
    candidates: impl Iterator<Item = (&'a Document, &'a [f32])>,
    k: usize,
) -> Result<Vec<ScoredDocument>> {
    let mut scored = Vec::new();
    for (document, vector) in candidates {
        check_dims(query, vector)?;
        scored.push(ScoredDocument {
            document: document.clone(),
            score: cosine_similarity(query, vector),
        });
    }
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    Ok(scored)
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid || name.len() > 63 {
        return Err(RagError::invalid(format!(
            "vector_store.table_name '{}' must match [A-Za-z_][A-Za-z0-9_]* (max 63 chars)",
            name
        ))
        .into());
    }
    Ok(())
}

/// Opens a store. `dims` is the embedding dimensionality.
pub type VectorStoreConnector =
    fn(VectorStoreConfig, usize) -> BoxFuture<'static, Result<Arc<dyn VectorStore>>>;

/// Maps provider ids (lowercase) to connectors.
pub struct VectorStoreRegistry {
    connectors: HashMap<String, VectorStoreConnector>,
}

impl VectorStoreRegistry {
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("neonpg", connect_pg);
        registry.register("postgres", connect_pg);
        registry.register("sqlite", |cfg, _dims| {
            async move {
                let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::connect(&cfg).await?);
                Ok(store)
            }
            .boxed()
        });
        registry.register("memory", |_cfg, _dims| {
            async move {
                let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
                Ok(store)
            }
            .boxed()
        });
        registry
    }

    pub fn register(&mut self, provider: &str, connector: VectorStoreConnector) {
        self.connectors
            .insert(provider.to_ascii_lowercase(), connector);
    }

    /// Connect to the store named in `config.provider`, retrying per
    /// `config.connect_attempts` / `config.connect_delay_ms`.
    ///
    /// # Errors
    ///
    /// Configuration errors are raised before any attempt is made;
    /// [`RagError::Connect`] once every attempt has failed.
    pub async fn connect(
        &self,
        config: &VectorStoreConfig,
        dims: usize,
    ) -> Result<Arc<dyn VectorStore>> {
        let provider = config.provider.trim().to_ascii_lowercase();
        if provider.is_empty() {
            return Err(RagError::MissingConfig("vector_store.provider").into());
        }
        let connector = *self
            .connectors
            .get(&provider)
            .ok_or_else(|| RagError::UnsupportedProvider {
                kind: "vector store",
                name: config.provider.clone(),
            })?;
        validate_table_name(&config.table_name)?;

        retry_connect(config.retry_policy(), &provider, || {
            connector(config.clone(), dims)
        })
        .await
    }
}

fn connect_pg(
    cfg: VectorStoreConfig,
    dims: usize,
) -> BoxFuture<'static, Result<Arc<dyn VectorStore>>> {
    async move {
        let store: Arc<dyn VectorStore> = Arc::new(PgVectorStore::connect(&cfg, dims).await?);
        Ok(store)
    }
    .boxed()
}

impl Default for VectorStoreRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_rag_error;
    use std::sync::atomic::{AtomicU32, Ordering};

    static FLAKY_CALLS: AtomicU32 = AtomicU32::new(0);

    fn memory_config() -> VectorStoreConfig {
        VectorStoreConfig {
            provider: "memory".into(),
            connect_delay_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_table_names() {
        assert!(validate_table_name("rag_embedding_table").is_ok());
        assert!(validate_table_name("_t1").is_ok());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("docs; DROP TABLE users").is_err());
        assert!(validate_table_name("").is_err());
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let store = VectorStoreRegistry::with_builtins()
            .connect(&memory_config(), 3)
            .await
            .unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let mut cfg = memory_config();
        cfg.provider = "pinecone".into();
        let err = VectorStoreRegistry::with_builtins()
            .connect(&cfg, 3)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            find_rag_error(&err),
            Some(RagError::UnsupportedProvider { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_connection_string_not_retried() {
        let cfg = VectorStoreConfig {
            provider: "neonpg".into(),
            connection_string: None,
            connect_delay_ms: 0,
            ..Default::default()
        };
        let err = VectorStoreRegistry::with_builtins()
            .connect(&cfg, 3)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            find_rag_error(&err),
            Some(RagError::MissingConfig("vector_store.connection_string"))
        ));
    }

    #[tokio::test]
    async fn test_connect_retries_registered_connector() {
        let mut registry = VectorStoreRegistry::new();
        registry.register("flaky", |_cfg, _dims| {
            async move {
                if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("connection refused");
                }
                let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
                Ok(store)
            }
            .boxed()
        });
        let cfg = VectorStoreConfig {
            provider: "flaky".into(),
            connect_delay_ms: 0,
            ..Default::default()
        };
        registry.connect(&cfg, 3).await.unwrap();
        assert_eq!(FLAKY_CALLS.load(Ordering::SeqCst), 3);
    }
}
