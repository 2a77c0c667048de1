//! TOML configuration.
//!
//! Every section has serde defaults so a minimal file only names the
//! providers. Secrets are resolved exactly once, in [`load_config`]:
//! a missing `api_key` falls back to `OPENAI_API_KEY` and a missing
//! `connection_string` to `DATABASE_URL`. Components receive the resolved
//! values and never read the environment themselves.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::RagError;
use crate::retry::RetryPolicy;
use crate::similarity::SimilarityMethod;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the API root, e.g. an OpenAI-compatible proxy or a local Ollama.
    #[serde(default)]
    pub url: Option<String>,
    /// Required for providers whose models have no known dimensionality.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            url: None,
            dims: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chat model settings. Sampling values are forwarded unchanged when set.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            url: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            top_k: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: String,
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            connection_string: None,
            table_name: default_table_name(),
            connect_attempts: default_connect_attempts(),
            connect_delay_ms: default_connect_delay_ms(),
        }
    }
}

impl VectorStoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            delay: Duration::from_millis(self.connect_delay_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// How many nearest neighbours to pull from the store before reranking.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default)]
    pub rerank: SimilarityMethod,
    #[serde(default)]
    pub pipeline: RagPipeline,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_k: default_candidate_k(),
            rerank: SimilarityMethod::default(),
            pipeline: RagPipeline::default(),
        }
    }
}

/// Available retrieval pipelines.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RagPipeline {
    /// Retrieve, rerank, stuff into one prompt.
    #[default]
    Naive,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_store_provider() -> String {
    "neonpg".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_table_name() -> String {
    "rag_embedding_table".to_string()
}
fn default_connect_attempts() -> u32 {
    5
}
fn default_connect_delay_ms() -> u64 {
    2000
}
fn default_chunk_size() -> usize {
    400
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_top_k() -> usize {
    10
}
fn default_candidate_k() -> usize {
    20
}

/// Environment lookups needed to fill in secrets.
///
/// Abstracted so [`Config::resolve_secrets`] can be exercised without
/// touching the process environment.
pub trait SecretSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl Config {
    /// Fill unset secrets from `env`. Explicit values in the file win.
    pub fn resolve_secrets(&mut self, env: &dyn SecretSource) {
        if self.embedding.api_key.is_none() && self.embedding.provider.eq_ignore_ascii_case("openai")
        {
            self.embedding.api_key = env.get(OPENAI_API_KEY_ENV);
        }
        if self.llm.api_key.is_none() && self.llm.provider.eq_ignore_ascii_case("openai") {
            self.llm.api_key = env.get(OPENAI_API_KEY_ENV);
        }
        if self.vector_store.connection_string.is_none() {
            self.vector_store.connection_string = env.get(DATABASE_URL_ENV);
        }
    }

    /// Check values that would otherwise fail deep inside a provider.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::invalid("chunking.chunk_size must be > 0").into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::invalid(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            ))
            .into());
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::invalid("retrieval.top_k must be >= 1").into());
        }
        if self.retrieval.candidate_k < self.retrieval.top_k {
            return Err(RagError::invalid(
                "retrieval.candidate_k must be >= retrieval.top_k",
            )
            .into());
        }
        if self.vector_store.connect_attempts == 0 {
            return Err(RagError::invalid("vector_store.connect_attempts must be >= 1").into());
        }
        Ok(())
    }
}

/// Parse a TOML config string, resolve secrets, and validate.
pub fn parse_config(content: &str, env: &dyn SecretSource) -> Result<Config> {
    let table: toml::Table =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    check_rerank(&table)?;
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.resolve_secrets(env);
    config.validate()?;
    Ok(config)
}

/// Reject an unknown `retrieval.rerank` before serde would, so the error
/// stays a [`RagError`].
fn check_rerank(table: &toml::Table) -> Result<()> {
    let Some(raw) = table.get("retrieval").and_then(|r| r.get("rerank")) else {
        return Ok(());
    };
    let name = raw
        .as_str()
        .ok_or_else(|| RagError::invalid("retrieval.rerank must be a string"))?;
    name.parse::<SimilarityMethod>()?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content, &ProcessEnv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeEnv(HashMap<&'static str, &'static str>);

    impl SecretSource for FakeEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    fn empty_env() -> FakeEnv {
        FakeEnv(HashMap::new())
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config = parse_config("", &empty_env()).unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.vector_store.table_name, "rag_embedding_table");
        assert_eq!(config.vector_store.connect_attempts, 5);
        assert_eq!(config.vector_store.connect_delay_ms, 2000);
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.rerank, SimilarityMethod::Cosine);
        assert_eq!(config.retrieval.pipeline, RagPipeline::Naive);
        assert!(config.embedding.api_key.is_none());
    }

    #[test]
    fn test_secrets_fall_back_to_env() {
        let env = FakeEnv(HashMap::from([
            (OPENAI_API_KEY_ENV, "sk-env"),
            (DATABASE_URL_ENV, "postgres://env"),
        ]));
        let config = parse_config("", &env).unwrap();
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(
            config.vector_store.connection_string.as_deref(),
            Some("postgres://env")
        );
    }

    #[test]
    fn test_explicit_secret_wins() {
        let env = FakeEnv(HashMap::from([(OPENAI_API_KEY_ENV, "sk-env")]));
        let config = parse_config(
            r#"
[embedding]
provider = "openai"
model = "text-embedding-3-large"
api_key = "sk-file"
"#,
            &env,
        )
        .unwrap();
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn test_ollama_does_not_pick_up_openai_key() {
        let env = FakeEnv(HashMap::from([(OPENAI_API_KEY_ENV, "sk-env")]));
        let config = parse_config("[llm]\nprovider = \"ollama\"\n", &env).unwrap();
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_rerank_parsed() {
        let config = parse_config("[retrieval]\nrerank = \"dot\"\n", &empty_env()).unwrap();
        assert_eq!(config.retrieval.rerank, SimilarityMethod::Dot);
    }

    #[test]
    fn test_unknown_rerank_rejected() {
        let err = parse_config("[retrieval]\nrerank = \"euclid\"\n", &empty_env()).unwrap_err();
        assert!(format!("{:#}", err).contains("euclid"));
        assert!(crate::error::find_rag_error(&err).unwrap().is_config());

        let err = parse_config("[retrieval]\nrerank = 3\n", &empty_env()).unwrap_err();
        assert!(crate::error::find_rag_error(&err).unwrap().is_config());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse_config(
            "[chunking]\nchunk_size = 50\nchunk_overlap = 50\n",
            &empty_env(),
        )
        .unwrap_err();
        let rag = crate::error::find_rag_error(&err).unwrap();
        assert!(rag.is_config());
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/ragngine.example.toml"), &empty_env())
            .unwrap();
        assert_eq!(config.embedding.model.as_deref(), Some("text-embedding-3-small"));
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.retrieval.candidate_k, 20);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = parse_config(
            "[vector_store]\nconnect_attempts = 3\nconnect_delay_ms = 10\n",
            &empty_env(),
        )
        .unwrap();
        let policy = config.vector_store.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(10));
    }
}
