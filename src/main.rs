//! # docchat CLI
//!
//! The `docchat` binary ingests PDF documents and answers questions about
//! them using retrieval-augmented generation.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat ingest <paths...>` | Chunk, embed, and index PDF files or directories |
//! | `docchat ask "<question>"` | Ask a question over the indexed documents |
//! | `docchat serve` | Start the JSON HTTP server |
//! | `docchat status` | Show configured providers and probe the index |
//!
//! ## Examples
//!
//! ```bash
//! # Index a directory of manuals
//! docchat ingest ./manuals --config ./docchat.toml
//!
//! # See what would be indexed without touching any API
//! docchat ingest ./manuals --dry-run
//!
//! # One-shot question; prints a session id to continue with
//! docchat ask "How do I reset the device?"
//!
//! # Continue the conversation
//! docchat ask "And without the app?" --session 3e9a6c1f-...
//!
//! # Only answer from one document
//! docchat ask "What changed?" --source release-notes.pdf
//!
//! # Start the HTTP server
//! docchat serve --config ./docchat.toml
//! ```

mod ask;
mod chunk;
mod config;
mod embedding;
mod extract;
mod generate;
#[allow(dead_code)]
mod history;
mod index;
mod ingest;
mod models;
mod pipeline;
mod prompt;
mod retrieve;
mod server;
mod status;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Question answering over your PDF documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `docchat.example.toml` for a full example. API tokens are read
/// from the environment (or a `.env` file), never from the config file.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — retrieval-augmented question answering over PDF documents",
    version,
    long_about = "docchat ingests PDF files, splits them into overlapping chunks, embeds them \
    with a hosted model, and indexes the vectors in Weaviate. Questions are answered by \
    retrieving the closest chunks and prompting a hosted language model with them and the \
    session's chat history."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./docchat.toml`. A missing file is fine: every setting
    /// has a built-in default.
    #[arg(long, global = true, default_value = "./docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest PDF files into the vector index.
    ///
    /// Each document is extracted page by page, split into overlapping
    /// chunks, embedded, and indexed. Directories are walked recursively for
    /// `*.pdf` files. A document identifier that was already ingested in
    /// this process is skipped.
    Ingest {
        /// PDF files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Extract and chunk only: print counts without embedding or
        /// indexing anything. Needs no API tokens.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask a question over the indexed documents.
    ///
    /// Retrieves the closest chunks, prompts the configured model with them
    /// and the session history, and prints the answer with its sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Session id from a previous `ask`, to continue that conversation.
        /// Without it a fresh session id is minted and printed.
        #[arg(long)]
        session: Option<String>,

        /// Only retrieve chunks from this ingested document (source name,
        /// e.g. `manual.pdf`).
        #[arg(long)]
        source: Option<String>,

        /// Override the configured number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `/chat`, `/documents`, `/sessions/{id}/history`, and `/health`.
    Serve,

    /// Show configured providers and probe the vector index.
    ///
    /// Reads everything from configuration and only contacts the index
    /// readiness endpoint, so no API tokens are needed.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths, dry_run } => {
            ingest::run_ingest(&config, &paths, dry_run).await?;
        }
        Commands::Ask {
            question,
            session,
            source,
            top_k,
        } => {
            ask::run_ask(&config, &question, session, source, top_k).await?;
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
        Commands::Status => {
            status::run_status(&config).await?;
        }
    }

    Ok(())
}
