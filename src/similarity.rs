//! Vector similarity measures used for reranking.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RagError;

/// How a document embedding is compared with a query embedding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SimilarityMethod {
    /// Normalized inner product, in `[-1.0, 1.0]`.
    #[default]
    Cosine,
    /// Raw inner product, unbounded.
    Dot,
}

impl SimilarityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::Cosine => "cosine",
            SimilarityMethod::Dot => "dot",
        }
    }

    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMethod::Cosine => cosine_similarity(a, b),
            SimilarityMethod::Dot => dot_product(a, b),
        }
    }
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimilarityMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityMethod::Cosine),
            "dot" => Ok(SimilarityMethod::Dot),
            other => Err(RagError::invalid(format!(
                "unknown similarity measure '{}'; use cosine or dot",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for SimilarityMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Fails with [`RagError::InvalidConfig`] when `other` does not have the
/// query's dimensionality, e.g. a store filled by a different model.
pub fn check_dims(query: &[f32], other: &[f32]) -> Result<(), RagError> {
    if query.len() != other.len() {
        return Err(RagError::invalid(format!(
            "embedding dimension mismatch: query has {} dims, stored vector has {}",
            query.len(),
            other.len()
        )));
    }
    Ok(())
}

/// Inner product of two vectors.
///
/// Returns `0.0` when the lengths differ; scoring paths reject that case
/// earlier with [`check_dims`].
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty or zero-norm vectors, and for mismatched
/// lengths, which scoring paths reject earlier with [`check_dims`].
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    // Rounding can push |cos| a hair past 1.
    (dot / denom).clamp(-1.0, 1.0)
}
