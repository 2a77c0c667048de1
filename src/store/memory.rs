//! In-memory [`VectorStore`] for tests and throwaway sessions.
//!
//! Nothing is persisted. Search is brute-force cosine similarity over every
//! stored vector.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_lengths, nearest, VectorStore};
use crate::models::{Document, Embedding, ScoredDocument};

struct StoredVector {
    document: Document,
    vector: Embedding,
}

pub struct InMemoryVectorStore {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn add_documents(
        &self,
        documents: &[Document],
        embeddings: &[Embedding],
    ) -> Result<usize> {
        check_lengths(documents, embeddings)?;
        let mut stored = self.vectors.write().await;
        stored.extend(
            documents
                .iter()
                .zip(embeddings)
                .map(|(document, vector)| StoredVector {
                    document: document.clone(),
                    vector: vector.clone(),
                }),
        );
        Ok(documents.len())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let stored = self.vectors.read().await;
        nearest(
            query,
            stored.iter().map(|sv| (&sv.document, sv.vector.as_slice())),
            k,
        )
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new(text)
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        let added = store
            .add_documents(
                &[doc("east"), doc("north"), doc("north-east")],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            )
            .await
            .unwrap();
        assert_eq!(added, 3);

        let hits = store.similarity_search(&[0.0, 1.0], 2).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.document.page_content.as_str()).collect();
        assert_eq!(texts, vec!["north", "north-east"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_k_larger_than_store() {
        let store = InMemoryVectorStore::new();
        store
            .add_documents(&[doc("only")], &[vec![0.5, 0.5]])
            .await
            .unwrap();
        assert_eq!(store.similarity_search(&[1.0, 0.0], 10).await.unwrap().len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let store = InMemoryVectorStore::new();
        assert!(store
            .add_documents(&[doc("a"), doc("b")], &[vec![1.0]])
            .await
            .is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let store = InMemoryVectorStore::new();
        store
            .add_documents(&[doc("small model")], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        let err = store
            .similarity_search(&[1.0, 0.0, 0.0], 5)
            .await
            .unwrap_err();
        assert!(crate::error::find_rag_error(&err).unwrap().is_config());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryVectorStore::new();
        assert!(store.similarity_search(&[1.0], 5).await.unwrap().is_empty());
    }
}
