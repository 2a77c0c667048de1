use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::RagError;
use crate::models::Embedding;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The embedding models OpenAI serves that this crate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiEmbeddingModel {
    TextEmbedding3Small,
    TextEmbedding3Large,
}

impl OpenAiEmbeddingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenAiEmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
            OpenAiEmbeddingModel::TextEmbedding3Large => "text-embedding-3-large",
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            OpenAiEmbeddingModel::TextEmbedding3Small => 1536,
            OpenAiEmbeddingModel::TextEmbedding3Large => 3072,
        }
    }
}

impl FromStr for OpenAiEmbeddingModel {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-embedding-3-small" => Ok(OpenAiEmbeddingModel::TextEmbedding3Small),
            "text-embedding-3-large" => Ok(OpenAiEmbeddingModel::TextEmbedding3Large),
            other => Err(RagError::UnsupportedModel {
                provider: "openai".to_string(),
                model: other.to_string(),
            }),
        }
    }
}

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {base}/embeddings` with all texts of a batch in one request.
pub struct OpenAiEmbeddings {
    model: OpenAiEmbeddingModel,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// - [`RagError::MissingConfig`] if the model or API key is not set.
    /// - [`RagError::UnsupportedModel`] for models other than
    ///   `text-embedding-3-small` and `text-embedding-3-large`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model: OpenAiEmbeddingModel = config
            .model
            .as_deref()
            .ok_or(RagError::MissingConfig("embedding.model"))?
            .parse()?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(RagError::MissingConfig("embedding.api_key"))?;
        let base_url = config
            .url
            .as_deref()
            .unwrap_or(OPENAI_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            api_key,
            base_url,
            client,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        self.model.as_str()
    }

    fn dims(&self) -> usize {
        self.model.dims()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model.as_str(),
            "input": texts,
        });

        debug!(model = self.model.as_str(), inputs = texts.len(), "openai embeddings request");

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI embeddings request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Provider {
                provider: "openai",
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Invalid OpenAI embeddings response")?;
        parse_openai_response(parsed, texts.len())
    }
}

/// Order vectors by their `index` field and check one came back per input.
fn parse_openai_response(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Embedding>> {
    if response.data.len() != expected {
        anyhow::bail!(
            "OpenAI returned {} embeddings for {} inputs",
            response.data.len(),
            expected
        );
    }
    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}
