//! The RAG pipeline: ingest documents, retrieve and rerank, answer.
//!
//! [`RagEngine`] owns one embedding provider, one vector store, and one chat
//! model, all behind trait objects so any registered backend can be mixed
//! with any other.
//!
//! # Ingest
//!
//! ```text
//! DocumentSource ─▶ split ─▶ embed each chunk ─▶ VectorStore::add_documents
//! ```
//!
//! # Query
//!
//! ```text
//! RagQuery ─▶ embed query ─▶ similarity_search(candidate_k)
//!          ─▶ rerank(method, top_k) ─▶ prompt ─▶ LlmProvider::complete
//! ```
//!
//! Every stage propagates its errors; nothing is logged and dropped.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ChunkingConfig, Config, RagPipeline, RetrievalConfig};
use crate::embedding::{embed_document, EmbeddingProvider, EmbeddingRegistry};
use crate::error::RagError;
use crate::llm::{LlmProvider, LlmRegistry};
use crate::loader::DocumentSource;
use crate::models::{Document, Embedding, ScoredDocument};
use crate::prompt::build_messages;
use crate::rerank::rerank_documents;
use crate::similarity::SimilarityMethod;
use crate::store::{VectorStore, VectorStoreRegistry};

/// A question plus optional overrides of the configured retrieval settings.
#[derive(Debug, Clone)]
pub struct RagQuery {
    pub query: String,
    pub top_k: Option<usize>,
    pub rerank: Option<SimilarityMethod>,
}

impl RagQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            rerank: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_rerank(mut self, method: SimilarityMethod) -> Self {
        self.rerank = Some(method);
        self
    }
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub location: String,
    pub chunks: usize,
    /// True when the document type is unsupported and nothing was stored.
    pub skipped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<ScoredDocument>,
}

pub struct RagEngine {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
}

impl RagEngine {
    /// Build an engine with default chunking and retrieval settings.
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            embeddings,
            store,
            llm,
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Build every component from a resolved configuration.
    ///
    /// The store is connected with retry and sized to the embedding
    /// provider's dimensionality.
    pub async fn from_config(
        config: &Config,
        embedding_registry: &EmbeddingRegistry,
        llm_registry: &LlmRegistry,
        store_registry: &VectorStoreRegistry,
    ) -> Result<Self> {
        let embeddings = embedding_registry.create(&config.embedding)?;
        let llm = llm_registry.create(&config.llm)?;
        let store = store_registry
            .connect(&config.vector_store, embeddings.dims())
            .await?;

        info!(
            embedding = embeddings.model_name(),
            llm = llm.model_name(),
            store = store.name(),
            "rag engine ready"
        );

        Ok(Self::new(embeddings, store, llm)
            .with_chunking(config.chunking.clone())
            .with_retrieval(config.retrieval.clone()))
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Split, embed, and store one document.
    ///
    /// Chunk sizes on `source` take precedence over the engine's chunking
    /// settings. Unsupported document types produce a skipped report.
    pub async fn ingest(&self, source: &DocumentSource) -> Result<IngestReport> {
        let source = DocumentSource {
            location: source.location.clone(),
            chunk_size: source.chunk_size.or(Some(self.chunking.chunk_size)),
            chunk_overlap: source.chunk_overlap.or(Some(self.chunking.chunk_overlap)),
        };

        let embedded = match embed_document(self.embeddings.as_ref(), &source).await? {
            Some(embedded) => embedded,
            None => {
                info!(location = %source.location, "unsupported document type, skipped");
                return Ok(IngestReport {
                    location: source.location,
                    chunks: 0,
                    skipped: true,
                });
            }
        };

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let (documents, vectors): (Vec<Document>, Vec<Embedding>) = embedded
            .into_iter()
            .map(|item| {
                let metadata = serde_json::json!({
                    "source": source.location,
                    "chunk_id": item.chunk.id,
                    "chunk_index": item.chunk.index,
                    "hash": item.chunk.hash,
                    "ingested_at": ingested_at,
                });
                (
                    Document::with_metadata(item.chunk.text, metadata),
                    item.embedding,
                )
            })
            .unzip();

        let stored = self
            .store
            .add_documents(&documents, &vectors)
            .await
            .with_context(|| format!("Failed to store chunks of {}", source.location))?;

        info!(location = %source.location, chunks = stored, store = self.store.name(), "ingested");
        Ok(IngestReport {
            location: source.location,
            chunks: stored,
            skipped: false,
        })
    }

    /// Nearest documents for the query, reranked.
    pub async fn retrieve(&self, query: &RagQuery) -> Result<Vec<ScoredDocument>> {
        if query.query.trim().is_empty() {
            return Err(RagError::MissingConfig("query").into());
        }
        let top_k = query.top_k.unwrap_or(self.retrieval.top_k);
        let method = query.rerank.unwrap_or(self.retrieval.rerank);
        let candidate_k = self.retrieval.candidate_k.max(top_k);

        let query_vec = self
            .embeddings
            .embed_query(&query.query)
            .await
            .context("Failed to embed query")?;
        let candidates = self
            .store
            .similarity_search(&query_vec, candidate_k)
            .await
            .context("Vector store search failed")?;
        debug!(candidates = candidates.len(), candidate_k, "retrieved candidates");

        let documents = candidates.into_iter().map(|c| c.document).collect();
        rerank_documents(
            self.embeddings.as_ref(),
            &query.query,
            documents,
            method,
            top_k,
        )
        .await
    }

    /// Answer `query` with the configured retrieval pipeline.
    pub async fn answer(&self, query: &RagQuery) -> Result<RagAnswer> {
        match self.retrieval.pipeline {
            RagPipeline::Naive => self.answer_naive(query).await,
        }
    }

    /// Retrieve, then ask the chat model to answer from the retrieved context.
    async fn answer_naive(&self, query: &RagQuery) -> Result<RagAnswer> {
        let sources = self.retrieve(query).await?;
        let messages = build_messages(&query.query, &sources);
        let answer = self
            .llm
            .complete(&messages)
            .await
            .context("LLM request failed")?;
        debug!(sources = sources.len(), model = self.llm.model_name(), "answered");
        Ok(RagAnswer { answer, sources })
    }
}
