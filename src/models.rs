//! Core data types that flow through the ingestion and query pipeline.

use serde::Serialize;

/// A vector embedding - fixed size array of floats.
pub type Embedding = Vec<f32>;

/// A unit of text passed to embedding providers and vector stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(page_content: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }
}

/// A window of a source document produced by the splitter.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A document together with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}
