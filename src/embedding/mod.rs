//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`OpenAiEmbeddings`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEmbeddings`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! # Provider Selection
//!
//! [`EmbeddingRegistry`] maps a provider id from the configuration to a
//! constructor. New providers are added with
//! [`EmbeddingRegistry::register`] without touching the dispatch code:
//!
//! ```rust,no_run
//! # use ragngine::config::EmbeddingConfig;
//! # use ragngine::embedding::EmbeddingRegistry;
//! let config = EmbeddingConfig {
//!     model: Some("text-embedding-3-small".into()),
//!     api_key: Some("sk-...".into()),
//!     ..Default::default()
//! };
//! let provider = EmbeddingRegistry::with_builtins().create(&config).unwrap();
//! assert_eq!(provider.dims(), 1536);
//! ```
//!
//! Failed API calls are not retried; the error carries the HTTP status and
//! response body.

pub(crate) mod ollama;
pub(crate) mod openai;

pub use ollama::OllamaEmbeddings;
pub use openai::{OpenAiEmbeddingModel, OpenAiEmbeddings};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::RagError;
use crate::loader::{split_document, DocumentSource};
use crate::models::{Chunk, Embedding};

/// Trait for text embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// A chunk paired with its vector.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// Split a document and embed every chunk.
///
/// Each chunk is sent as its own request and all requests run concurrently.
/// Returns `Ok(None)` when the document type is unsupported.
pub async fn embed_document(
    provider: &dyn EmbeddingProvider,
    source: &DocumentSource,
) -> Result<Option<Vec<EmbeddedChunk>>> {
    let chunks = match split_document(source).await? {
        Some(chunks) => chunks,
        None => return Ok(None),
    };

    let vectors = try_join_all(
        chunks
            .iter()
            .map(|chunk| provider.embed_query(&chunk.text)),
    )
    .await
    .with_context(|| format!("Failed to embed document: {}", source.location))?;

    debug!(
        location = %source.location,
        chunks = chunks.len(),
        model = provider.model_name(),
        "document embedded"
    );

    Ok(Some(
        chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect(),
    ))
}

/// Builds an embedding provider from its configuration.
pub type EmbeddingConstructor =
    fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>>;

/// Maps provider ids (lowercase) to constructors.
pub struct EmbeddingRegistry {
    constructors: HashMap<String, EmbeddingConstructor>,
}

impl EmbeddingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with `openai` and `ollama` registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("openai", |cfg| Ok(Arc::new(OpenAiEmbeddings::new(cfg)?)));
        registry.register("ollama", |cfg| Ok(Arc::new(OllamaEmbeddings::new(cfg)?)));
        registry
    }

    /// Register (or replace) a provider constructor.
    pub fn register(&mut self, provider: &str, constructor: EmbeddingConstructor) {
        self.constructors
            .insert(provider.to_ascii_lowercase(), constructor);
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate the provider named in `config.provider`.
    ///
    /// # Errors
    ///
    /// - [`RagError::MissingConfig`] when the provider or model is empty.
    /// - [`RagError::UnsupportedProvider`] when no constructor is registered.
    /// - Whatever the provider's constructor rejects (API key, model).
    pub fn create(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider = config.provider.trim().to_ascii_lowercase();
        if provider.is_empty() {
            return Err(RagError::MissingConfig("embedding.provider").into());
        }
        if config.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(RagError::MissingConfig("embedding.model").into());
        }
        let constructor =
            self.constructors
                .get(&provider)
                .ok_or_else(|| RagError::UnsupportedProvider {
                    kind: "embedding",
                    name: config.provider.clone(),
                })?;
        constructor(config)
    }
}

impl Default for EmbeddingRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
