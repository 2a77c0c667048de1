//! # ragngine CLI
//!
//! ## Usage
//!
//! ```bash
//! ragngine --config ./config/ragngine.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragngine init` | Connect to the vector store (with retry) and create its table |
//! | `ragngine split <location>` | Print the chunks of a document; no network calls for local files |
//! | `ragngine ingest <location>...` | Split, embed, and store documents |
//! | `ragngine search "<query>"` | Retrieve and rerank stored chunks |
//! | `ragngine ask "<query>"` | Answer a question from stored chunks |
//!
//! ## Examples
//!
//! ```bash
//! ragngine split ./testing/notes.txt --chunk-size 200 --chunk-overlap 20
//! ragngine ingest ./docs/handbook.pdf https://example.com/faq.txt
//! ragngine search "data mining" --top-k 5 --rerank dot
//! ragngine ask "what is data mining?" -v
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use ragngine::config::{self, Config};
use ragngine::embedding::EmbeddingRegistry;
use ragngine::llm::LlmRegistry;
use ragngine::loader::{split_document, DocumentSource};
use ragngine::logging::init_logging;
use ragngine::models::ScoredDocument;
use ragngine::similarity::SimilarityMethod;
use ragngine::store::VectorStoreRegistry;
use ragngine::{RagEngine, RagQuery};

/// ragngine: retrieval-augmented generation over your own documents.
///
/// Embedding provider, vector store, and chat model are picked by name in
/// the configuration file. See `config/ragngine.example.toml`.
#[derive(Parser)]
#[command(
    name = "ragngine",
    about = "Retrieval-augmented generation over your own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragngine.toml")]
    config: PathBuf,

    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the vector store and create its table.
    ///
    /// Idempotent. Uses the embedding model's dimensionality to size a
    /// new pgvector column.
    Init,

    /// Split a document and print its chunks.
    ///
    /// Reads chunk defaults from the config file when it exists.
    Split {
        /// File path or http(s) URL of a .txt or .pdf document.
        location: String,

        #[arg(long)]
        chunk_size: Option<usize>,

        #[arg(long)]
        chunk_overlap: Option<usize>,
    },

    /// Split, embed, and store one or more documents.
    Ingest {
        /// File paths or http(s) URLs. Unsupported types are skipped.
        #[arg(required = true)]
        locations: Vec<String>,
    },

    /// Retrieve stored chunks for a query, reranked by similarity.
    Search {
        query: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,

        /// Rerank measure: `cosine` or `dot` (defaults to retrieval.rerank).
        #[arg(long)]
        rerank: Option<SimilarityMethod>,
    },

    /// Answer a question using the stored chunks as context.
    Ask {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        rerank: Option<SimilarityMethod>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Splitting works without a config file
    if let Commands::Split {
        location,
        chunk_size,
        chunk_overlap,
    } = &cli.command
    {
        let cfg = if cli.config.exists() {
            config::load_config(&cli.config)?
        } else {
            debug!(path = %cli.config.display(), "no config file, using defaults");
            Config::default()
        };
        return run_split(&cfg, location, *chunk_size, *chunk_overlap).await;
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let embeddings = EmbeddingRegistry::with_builtins().create(&cfg.embedding)?;
            let store = VectorStoreRegistry::with_builtins()
                .connect(&cfg.vector_store, embeddings.dims())
                .await?;
            println!(
                "Vector store '{}' ready (table {}, {} dims, {} documents).",
                store.name(),
                cfg.vector_store.table_name,
                embeddings.dims(),
                store.count().await?
            );
        }
        Commands::Split { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Ingest { locations } => {
            let engine = build_engine(&cfg).await?;
            let mut total = 0;
            for location in &locations {
                let report = engine.ingest(&DocumentSource::new(location)).await?;
                if report.skipped {
                    println!("skipped {} (unsupported document type)", report.location);
                } else {
                    println!("ingested {} ({} chunks)", report.location, report.chunks);
                    total += report.chunks;
                }
            }
            println!("Done: {} chunks from {} documents.", total, locations.len());
        }
        Commands::Search {
            query,
            top_k,
            rerank,
        } => {
            let engine = build_engine(&cfg).await?;
            let results = engine.retrieve(&rag_query(query, top_k, rerank)).await?;
            if results.is_empty() {
                println!("No results.");
            }
            print_sources(&results);
        }
        Commands::Ask {
            query,
            top_k,
            rerank,
        } => {
            let engine = build_engine(&cfg).await?;
            let answer = engine.answer(&rag_query(query, top_k, rerank)).await?;
            println!("{}", answer.answer.trim());
            if !answer.sources.is_empty() {
                println!("\nSources:");
                print_sources(&answer.sources);
            }
        }
    }

    Ok(())
}

async fn build_engine(cfg: &Config) -> Result<RagEngine> {
    RagEngine::from_config(
        cfg,
        &EmbeddingRegistry::with_builtins(),
        &LlmRegistry::with_builtins(),
        &VectorStoreRegistry::with_builtins(),
    )
    .await
}

fn rag_query(query: String, top_k: Option<usize>, rerank: Option<SimilarityMethod>) -> RagQuery {
    RagQuery {
        query,
        top_k,
        rerank,
    }
}

async fn run_split(
    cfg: &Config,
    location: &str,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<()> {
    let source = DocumentSource {
        location: location.to_string(),
        chunk_size: Some(chunk_size.unwrap_or(cfg.chunking.chunk_size)),
        chunk_overlap: Some(chunk_overlap.unwrap_or(cfg.chunking.chunk_overlap)),
    };

    let chunks = match split_document(&source).await? {
        Some(chunks) => chunks,
        None => {
            println!("Unsupported document type: {}", location);
            return Ok(());
        }
    };

    println!("Split '{}' into {} chunks:", location, chunks.len());
    for chunk in &chunks {
        println!(
            "\n--- Chunk {} ({} chars, {}) ---",
            chunk.index + 1,
            chunk.text.chars().count(),
            &chunk.hash[..8]
        );
        println!("{}", chunk.text);
    }
    Ok(())
}

fn print_sources(results: &[ScoredDocument]) {
    for (i, result) in results.iter().enumerate() {
        let source = result
            .document
            .metadata
            .get("source")
            .and_then(|s| s.as_str())
            .unwrap_or("-");
        println!("{}. [{:.3}] {}", i + 1, result.score, source);
        println!("   {}", preview(&result.document.page_content, 200));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
