//! # docchat
//!
//! Retrieval-augmented question answering over your PDF documents.
//!
//! docchat ingests PDF files, splits them into overlapping character chunks,
//! embeds the chunks with a hosted model, and stores the vectors in Weaviate.
//! Questions are answered by retrieving the closest chunks, rendering them
//! into a prompt together with the session's chat history, and asking a
//! hosted language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │   PDFs   │──▶│ Chunk+Embed │──▶│ Weaviate │
//! └──────────┘   └─────────────┘   └────┬─────┘
//!                                       │ top-k
//!                ┌─────────────┐   ┌────▼─────┐
//!    question ──▶│  Sessions   │──▶│ Prompt + │──▶ answer
//!                │  (history)  │   │ Generate │
//!                └─────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat ingest ./docs               # index every PDF under ./docs
//! docchat ask "What is the warranty?" # one-shot question
//! docchat serve                       # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Recursive character chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index abstraction (Weaviate, in-memory) |
//! | [`ingest`] | Document ingestion |
//! | [`retrieve`] | Query-time retrieval |
//! | [`history`] | Session-scoped chat history |
//! | [`prompt`] | Prompt template rendering |
//! | [`generate`] | Text generation provider abstraction |
//! | [`pipeline`] | The question-answering pipeline |
//! | [`server`] | JSON HTTP server |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod history;
pub mod index;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod server;
pub mod status;
