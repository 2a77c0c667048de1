//! Categorised failures.
//!
//! Functions throughout the crate return [`anyhow::Result`]; when a failure
//! belongs to one of the categories below it is raised as a [`RagError`]
//! so callers can tell them apart with `err.downcast_ref::<RagError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// A required setting (API key, connection string, provider, model) is absent.
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// A setting is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No constructor is registered for the requested provider id.
    #[error("unsupported {kind} provider: {name}")]
    UnsupportedProvider { kind: &'static str, name: String },

    /// The provider exists but does not serve the requested model.
    #[error("{provider} does not support model {model}")]
    UnsupportedModel { provider: String, model: String },

    /// An external API answered with a non-success status.
    #[error("{provider} API error {status}: {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Connecting to an external service failed on every attempt.
    #[error("failed to connect to {target} after {attempts} attempts")]
    Connect {
        target: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl RagError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        RagError::InvalidConfig(msg.into())
    }

    /// True for the configuration categories raised at construction or dispatch.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RagError::MissingConfig(_)
                | RagError::InvalidConfig(_)
                | RagError::UnsupportedProvider { .. }
                | RagError::UnsupportedModel { .. }
        )
    }
}

/// Look through an [`anyhow::Error`] chain for a [`RagError`].
pub fn find_rag_error(err: &anyhow::Error) -> Option<&RagError> {
    err.chain().find_map(|e| e.downcast_ref::<RagError>())
}
