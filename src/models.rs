//! Core data models used throughout docchat.
//!
//! These types represent the chunks, messages, and reports that flow through
//! the ingestion and chat pipelines.

use serde::{Deserialize, Serialize};

/// A chunk of text cut from one page of an ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk UUID, minted at ingest time.
    pub id: String,
    /// Chunk text, at most `chunking.chunk_size` characters.
    pub text: String,
    /// Caller-supplied document identifier (usually the file name).
    pub source: String,
    /// 1-based page the chunk came from.
    pub page: u32,
}

/// A chunk paired with its embedding vector, ready for indexing.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
    /// RFC 3339 ingestion timestamp stored alongside the chunk.
    pub ingested_at: String,
}

/// A chunk returned from a vector search, with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Cosine-derived similarity, higher is more similar.
    pub score: f32,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    /// Transcript tag used in prompts (`"human"` / `"ai"`).
    pub fn tag(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Ai => "ai",
        }
    }
}

/// A single message in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// Outcome of ingesting (or dry-run planning) one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// The document identifier the report is about.
    pub source: String,
    /// Pages found in the PDF.
    pub pages: usize,
    /// Chunks produced (and indexed, unless this was a dry run).
    pub chunks: usize,
    /// True when the identifier was already ingested and all work was skipped.
    pub skipped: bool,
}

impl IngestReport {
    /// Report for an identifier that was already ingested.
    pub fn already_ingested(source: &str) -> Self {
        Self {
            source: source.to_string(),
            pages: 0,
            chunks: 0,
            skipped: true,
        }
    }
}
