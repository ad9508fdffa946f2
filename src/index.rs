//! Vector index abstraction and implementations.
//!
//! The [`VectorIndex`] trait covers what the ingestion and chat pipelines
//! need from a vector store: batch insert, nearest-neighbour search, a
//! readiness probe, one-time setup, and explicit shutdown.
//!
//! Two backends ship:
//! - **[`WeaviateIndex`]**: a remote Weaviate instance over REST + GraphQL
//!   (the default).
//! - **[`MemoryIndex`]**: an in-process brute-force store for tests and
//!   local runs without external services.
//!
//! The index stores vectors it is given and never computes embeddings
//! itself; the Weaviate class is created with `vectorizer: "none"`.

use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::IndexConfig;
use crate::embedding::cosine_similarity;
use crate::models::{DocumentChunk, IndexEntry, ScoredChunk};

/// Abstract vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert a batch of chunks with their vectors. Any rejected object
    /// fails the whole call.
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Return the `k` chunks nearest to `query`, highest score first,
    /// optionally restricted to one source document.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Probe the backend for liveness.
    async fn ready(&self) -> Result<()>;

    /// One-time setup before first use (schema creation for remote backends).
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Release the connection. Called once at shutdown.
    async fn close(&self);
}

/// Create the appropriate [`VectorIndex`] based on configuration.
///
/// | Config value | Backend |
/// |--------------|---------|
/// | `"weaviate"` | [`WeaviateIndex`] |
/// | `"memory"` | [`MemoryIndex`] |
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "weaviate" => Ok(Arc::new(WeaviateIndex::new(config)?)),
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        other => bail!(
            "Unknown index provider: '{}'. Must be weaviate or memory.",
            other
        ),
    }
}

// ============ Weaviate ============

/// Vector index backed by a Weaviate instance.
///
/// Objects live in a single class (configurable, `DocChunk` by default)
/// with `text`, `source`, `page`, and `ingested_at` properties. Inserts go
/// through `POST /v1/batch/objects`; search is a GraphQL `Get` query with
/// `nearVector`, scored by `certainty`.
///
/// When the `WEAVIATE_API_KEY` environment variable is set it is sent as a
/// bearer token; without it the instance is assumed to be unauthenticated.
pub struct WeaviateIndex {
    base_url: String,
    class: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl WeaviateIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            class: config.collection.clone(),
            api_key: std::env::var("WEAVIATE_API_KEY").ok(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

#[async_trait]
impl VectorIndex for WeaviateIndex {
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let objects: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "class": self.class,
                    "id": e.chunk.id,
                    "vector": e.vector,
                    "properties": {
                        "text": e.chunk.text,
                        "source": e.chunk.source,
                        "page": e.chunk.page,
                        "ingested_at": e.ingested_at,
                    },
                })
            })
            .collect();

        let response = self
            .authorize(self.client.post(self.endpoint("/v1/batch/objects")))
            .json(&serde_json::json!({ "objects": objects }))
            .send()
            .await
            .context("Weaviate batch insert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Weaviate API error {}: {}", status, body);
        }

        // A 200 can still carry per-object failures in the result list.
        let results: serde_json::Value = response.json().await?;
        check_batch_results(&results)
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let gql = build_search_query(&self.class, query, k, source)?;

        let response = self
            .authorize(self.client.post(self.endpoint("/v1/graphql")))
            .json(&serde_json::json!({ "query": gql }))
            .send()
            .await
            .context("Weaviate search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Weaviate API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        if let Some(errors) = json.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                bail!(
                    "Weaviate query error: {}",
                    serde_json::Value::Array(errors.clone())
                );
            }
        }

        parse_search_hits(&json, &self.class)
    }

    async fn ready(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.endpoint("/v1/.well-known/ready")))
            .send()
            .await
            .with_context(|| format!("Weaviate at {} is unreachable", self.base_url))?;

        if !response.status().is_success() {
            bail!("Weaviate at {} is not ready ({})", self.base_url, response.status());
        }
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        let response = self
            .authorize(
                self.client
                    .get(self.endpoint(&format!("/v1/schema/{}", self.class))),
            )
            .send()
            .await
            .context("Weaviate schema check failed")?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Weaviate schema check failed ({}): {}", status, body);
        }

        let schema = serde_json::json!({
            "class": self.class,
            "vectorizer": "none",
            "properties": [
                { "name": "text", "dataType": ["text"] },
                { "name": "source", "dataType": ["text"] },
                { "name": "page", "dataType": ["int"] },
                { "name": "ingested_at", "dataType": ["text"] },
            ],
        });

        let response = self
            .authorize(self.client.post(self.endpoint("/v1/schema")))
            .json(&schema)
            .send()
            .await
            .context("Weaviate schema creation failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Weaviate schema creation failed ({}): {}", status, body);
        }

        tracing::info!("created Weaviate class {}", self.class);
        Ok(())
    }

    async fn close(&self) {
        tracing::debug!("closing Weaviate connection to {}", self.base_url);
    }
}

/// Surface per-object errors from a Weaviate batch response.
fn check_batch_results(results: &serde_json::Value) -> Result<()> {
    let Some(items) = results.as_array() else {
        return Ok(());
    };
    for item in items {
        if let Some(message) = item
            .pointer("/result/errors/error/0/message")
            .and_then(|m| m.as_str())
        {
            bail!("Weaviate rejected object: {}", message);
        }
    }
    Ok(())
}

/// Build the GraphQL `Get` query for a nearVector search.
///
/// The vector and the optional source filter are serialized through
/// `serde_json`, which keeps the float syntax and string escaping valid in
/// GraphQL as well.
fn build_search_query(
    class: &str,
    query: &[f32],
    k: usize,
    source: Option<&str>,
) -> Result<String> {
    let vector = serde_json::to_string(query)?;
    let filter = match source {
        Some(name) => format!(
            r#", where: {{ path: ["source"], operator: Equal, valueText: {} }}"#,
            serde_json::to_string(name)?
        ),
        None => String::new(),
    };
    Ok(format!(
        "{{ Get {{ {class}(nearVector: {{ vector: {vector} }}, limit: {k}{filter}) \
         {{ text source page ingested_at _additional {{ id certainty }} }} }} }}"
    ))
}

/// Parse GraphQL search hits into scored chunks.
fn parse_search_hits(json: &serde_json::Value, class: &str) -> Result<Vec<ScoredChunk>> {
    let hits = json
        .pointer(&format!("/data/Get/{}", class))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Weaviate response: missing data.Get.{}", class))?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let text_of = |field: &str| {
            hit.get(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        results.push(ScoredChunk {
            chunk: DocumentChunk {
                id: hit
                    .pointer("/_additional/id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                text: text_of("text"),
                source: text_of("source"),
                page: hit.get("page").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            },
            score: hit
                .pointer("/_additional/certainty")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0) as f32,
        });
    }
    Ok(results)
}

// ============ In-memory ============

/// In-memory vector index. Search is brute-force cosine similarity over all
/// stored entries.
pub struct MemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn insert(&self, mut new_entries: Vec<IndexEntry>) -> Result<()> {
        self.entries.write().unwrap().append(&mut new_entries);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<ScoredChunk> = entries
            .iter()
            .filter(|e| source.map_or(true, |s| e.chunk.source == s))
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {
        self.entries.write().unwrap().clear();
    }
}
