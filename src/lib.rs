//! # ragngine
//!
//! Provider-switchable retrieval-augmented generation.
//!
//! ragngine splits documents into overlapping chunks, embeds them with a
//! configured provider, stores the vectors, and answers questions by
//! retrieving, reranking, and handing the best chunks to a chat model.
//! Every external capability sits behind a trait and a registry, so
//! embedding providers, vector stores, and LLMs are chosen by name in the
//! configuration.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ loader       │──▶│ chunk        │──▶│ embedding    │──▶│ store       │
//! │ .txt / .pdf  │   │ recursive    │   │ OpenAI       │   │ pgvector    │
//! │ path / URL   │   │ splitter     │   │ Ollama       │   │ SQLite, mem │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬──────┘
//!                                                                 │
//!        ┌────────────────────────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ rerank       │──▶│ prompt       │──▶│ llm          │
//! │ cosine / dot │   │ context      │   │ OpenAI       │
//! │ > 0.3, top-k │   │ stuffing     │   │ Ollama       │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragngine init                          # connect and create the table
//! ragngine ingest ./docs/handbook.pdf    # split, embed, store
//! ragngine search "data mining" --top-k 5
//! ragngine ask "what is data mining?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and secret resolution |
//! | [`error`] | Categorised failures |
//! | [`models`] | Core data types |
//! | [`chunk`] | Recursive character splitter |
//! | [`loader`] | Document reading and text extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat model abstraction |
//! | [`store`] | Vector store abstraction |
//! | [`similarity`] | Cosine and dot similarity |
//! | [`rerank`] | Threshold, sort, and top-k |
//! | [`retry`] | Fixed-delay connect retry |
//! | [`prompt`] | Prompt assembly |
//! | [`engine`] | The end-to-end pipeline |
//! | [`logging`] | tracing subscriber setup |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod rerank;
pub mod retry;
pub mod similarity;
pub mod store;

pub use engine::{IngestReport, RagAnswer, RagEngine, RagQuery};
pub use error::RagError;
