//! Chat model abstraction and implementations.
//!
//! - **[`OpenAiChat`]**: OpenAI `chat/completions`.
//! - **[`OllamaChat`]**: a local Ollama instance's `/api/chat`.
//!
//! Providers are created through [`LlmRegistry`], which works like
//! [`EmbeddingRegistry`](crate::embedding::EmbeddingRegistry). Sampling
//! settings from [`LlmConfig`] are forwarded only when set.

mod ollama;
mod openai;

pub use ollama::OllamaChat;
pub use openai::OpenAiChat;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub type LlmConstructor = fn(&LlmConfig) -> Result<Arc<dyn LlmProvider>>;

/// Maps provider ids (lowercase) to constructors.
pub struct LlmRegistry {
    constructors: HashMap<String, LlmConstructor>,
}

impl LlmRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("openai", |cfg| Ok(Arc::new(OpenAiChat::new(cfg)?)));
        registry.register("ollama", |cfg| Ok(Arc::new(OllamaChat::new(cfg)?)));
        registry
    }

    pub fn register(&mut self, provider: &str, constructor: LlmConstructor) {
        self.constructors
            .insert(provider.to_ascii_lowercase(), constructor);
    }

    /// # Errors
    ///
    /// [`RagError::MissingConfig`] for an empty provider or model,
    /// [`RagError::UnsupportedProvider`] for unknown ids, plus anything the
    /// provider's constructor rejects.
    pub fn create(&self, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
        let provider = config.provider.trim().to_ascii_lowercase();
        if provider.is_empty() {
            return Err(RagError::MissingConfig("llm.provider").into());
        }
        if config.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(RagError::MissingConfig("llm.model").into());
        }
        let constructor =
            self.constructors
                .get(&provider)
                .ok_or_else(|| RagError::UnsupportedProvider {
                    kind: "llm",
                    name: config.provider.clone(),
                })?;
        constructor(config)
    }
}

impl Default for LlmRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
