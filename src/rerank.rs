//! Similarity reranking of retrieved documents.
//!
//! Each document is scored against the query embedding with the configured
//! [`SimilarityMethod`]. Scores at or below [`SIMILARITY_THRESHOLD`] are
//! dropped, the rest are sorted best first and cut to `top_k`. Equal scores
//! keep their input order.

use anyhow::{Context, Result};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::models::{Document, Embedding, ScoredDocument};
use crate::similarity::{check_dims, SimilarityMethod};

/// Documents must score strictly above this to survive reranking.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Score `doc_vecs` against `query_vec` and return `(index, score)` pairs
/// for the survivors, best first.
///
/// Every document vector must have the query's length.
pub fn rank(
    query_vec: &[f32],
    doc_vecs: &[Embedding],
    method: SimilarityMethod,
    top_k: usize,
) -> Result<Vec<(usize, f32)>> {
    let mut scored: Vec<(usize, f32)> = Vec::with_capacity(doc_vecs.len());
    for (i, v) in doc_vecs.iter().enumerate() {
        check_dims(query_vec, v)?;
        let score = method.score(query_vec, v);
        if score > SIMILARITY_THRESHOLD {
            scored.push((i, score));
        }
    }
    // sort_by is stable, so ties stay in input order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}

/// Embed `documents` and `query` with `embeddings`, then [`rank`] them.
pub async fn rerank_documents(
    embeddings: &dyn EmbeddingProvider,
    query: &str,
    documents: Vec<Document>,
    method: SimilarityMethod,
    top_k: usize,
) -> Result<Vec<ScoredDocument>> {
    if documents.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
    let (doc_vecs, query_vec) = tokio::try_join!(
        embeddings.embed_documents(&texts),
        embeddings.embed_query(query),
    )
    .context("Failed to embed documents for reranking")?;
    if doc_vecs.len() != documents.len() {
        anyhow::bail!(
            "embedding provider returned {} vectors for {} documents",
            doc_vecs.len(),
            documents.len()
        );
    }

    let ranked = rank(&query_vec, &doc_vecs, method, top_k)?;
    debug!(
        candidates = documents.len(),
        kept = ranked.len(),
        method = %method,
        "reranked"
    );

    let mut slots: Vec<Option<Document>> = documents.into_iter().map(Some).collect();
    Ok(ranked
        .into_iter()
        .filter_map(|(i, score)| {
            slots[i]
                .take()
                .map(|document| ScoredDocument { document, score })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[test]
    fn test_threshold_is_exclusive() {
        let docs = vec![vec![0.3, 0.0], vec![0.31, 0.0], vec![1.0, 0.0]];
        let ranked = rank(&[1.0, 0.0], &docs, SimilarityMethod::Dot, 10).unwrap();
        let kept: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(kept, vec![2, 1]);
    }

    #[test]
    fn test_sorted_and_truncated() {
        let docs = vec![
            vec![0.6, 0.8],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.8, 0.6],
        ];
        let ranked = rank(&[1.0, 0.0], &docs, SimilarityMethod::Cosine, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 3);
        assert!(ranked.iter().all(|(_, s)| *s > SIMILARITY_THRESHOLD));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let docs = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.0], vec![3.0, 0.0]];
        let ranked = rank(&[1.0, 0.0], &docs, SimilarityMethod::Cosine, 10).unwrap();
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 2, 3]);
    }

    #[test]
    fn test_dot_is_unbounded() {
        let ranked = rank(&[2.0, 2.0], &[vec![3.0, 3.0]], SimilarityMethod::Dot, 1).unwrap();
        assert_eq!(ranked, vec![(0, 12.0)]);
    }

    #[test]
    fn test_nan_scores_dropped() {
        let ranked = rank(&[1.0], &[vec![f32::NAN]], SimilarityMethod::Dot, 5).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let docs = vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0]];
        let err = rank(&[1.0, 0.0, 0.0], &docs, SimilarityMethod::Cosine, 5).unwrap_err();
        let rag = crate::error::find_rag_error(&err).unwrap();
        assert!(rag.is_config());
        assert!(err.to_string().contains("dimension mismatch"));
    }

    /// Maps known texts to fixed vectors.
    struct TableEmbeddings(HashMap<&'static str, Vec<f32>>);

    #[async_trait]
    impl EmbeddingProvider for TableEmbeddings {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            texts
                .iter()
                .map(|t| {
                    self.0
                        .get(t.as_str())
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no vector for {}", t))
                })
                .collect()
        }
    }

    fn table() -> TableEmbeddings {
        TableEmbeddings(HashMap::from([
            ("query", vec![1.0, 0.0]),
            ("close", vec![0.9, 0.1]),
            ("far", vec![0.0, 1.0]),
            ("middle", vec![0.7, 0.7]),
        ]))
    }

    #[tokio::test]
    async fn test_rerank_documents() {
        let docs = vec![
            Document::new("far"),
            Document::new("middle"),
            Document::new("close"),
        ];
        let out = rerank_documents(&table(), "query", docs, SimilarityMethod::Cosine, 5)
            .await
            .unwrap();
        let texts: Vec<&str> = out.iter().map(|d| d.document.page_content.as_str()).collect();
        assert_eq!(texts, vec!["close", "middle"]);
        assert!(out[0].score > out[1].score);
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let out = rerank_documents(
            &TableEmbeddings(HashMap::new()),
            "query",
            Vec::new(),
            SimilarityMethod::Cosine,
            5,
        )
        .await
        .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let docs = vec![Document::new("unknown text")];
        assert!(
            rerank_documents(&table(), "query", docs, SimilarityMethod::Cosine, 5)
                .await
                .is_err()
        );
    }
}
