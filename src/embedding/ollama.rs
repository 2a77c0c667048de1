use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::RagError;
use crate::models::Embedding;

pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`). Ollama models have no fixed
/// dimensionality, so `embedding.dims` must be set.
pub struct OllamaEmbeddings {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or(RagError::MissingConfig("embedding.model"))?;
        let dims = config
            .dims
            .filter(|d| *d > 0)
            .ok_or(RagError::MissingConfig("embedding.dims"))?;
        let url = config
            .url
            .as_deref()
            .unwrap_or(OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            client,
        })
    }
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Provider {
                provider: "ollama",
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .context("Invalid Ollama response: missing embeddings array")?;
        if parsed.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Ollama returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            );
        }
        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_required() {
        let cfg = EmbeddingConfig {
            provider: "ollama".into(),
            model: Some("nomic-embed-text".into()),
            ..Default::default()
        };
        assert!(OllamaEmbeddings::new(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_embed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "nomic-embed-text"
            })))
            .with_status(200)
            .with_body(r#"{"embeddings":[[0.5,0.5,0.0]]}"#)
            .create_async()
            .await;

        let cfg = EmbeddingConfig {
            provider: "ollama".into(),
            model: Some("nomic-embed-text".into()),
            dims: Some(3),
            url: Some(server.url()),
            ..Default::default()
        };
        let provider = OllamaEmbeddings::new(&cfg).unwrap();
        let v = provider.embed_query("hi").await.unwrap();
        assert_eq!(v, vec![0.5, 0.5, 0.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embedding_count_checked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embed")
            .with_status(200)
            .with_body(r#"{"embeddings":[[1.0,0.0]]}"#)
            .create_async()
            .await;

        let cfg = EmbeddingConfig {
            provider: "ollama".into(),
            model: Some("nomic-embed-text".into()),
            dims: Some(2),
            url: Some(server.url()),
            ..Default::default()
        };
        let provider = OllamaEmbeddings::new(&cfg).unwrap();
        let err = provider
            .embed_documents(&["one".to_string(), "two".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 inputs"));
    }
}
