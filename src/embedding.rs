//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and two hosted backends:
//! - **[`HuggingFaceEmbedder`]**: the Hugging Face Inference API
//!   feature-extraction pipeline (the default).
//! - **[`OpenAIEmbedder`]**: the OpenAI embeddings API.
//!
//! Use [`create_embedder`] to pick a backend from configuration. Requests
//! are single-shot: an upstream failure surfaces to the caller with the
//! response status and body, and nothing is retried.
//!
//! [`cosine_similarity`] lives here too; the in-memory index uses it for
//! brute-force search.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"sentence-transformers/all-mpnet-base-v2"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality, when the configuration declares one.
    fn dims(&self) -> Option<usize>;

    /// Embed a batch of texts: one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

impl std::fmt::Debug for dyn Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.model_name())
            .finish()
    }
}

/// Create the appropriate [`Embedder`] based on configuration.
///
/// | Config value | Backend |
/// |--------------|---------|
/// | `"huggingface"` | [`HuggingFaceEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
///
/// Fails for unknown provider names or when the provider's API token is not
/// in the environment.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "huggingface" => Ok(Arc::new(HuggingFaceEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => bail!(
            "Unknown embedding provider: '{}'. Must be huggingface or openai.",
            other
        ),
    }
}

// ============ Hugging Face provider ============

/// Embedding via the Hugging Face Inference API feature-extraction pipeline.
///
/// Sends `POST https://api-inference.huggingface.co/pipeline/feature-extraction/<model>`
/// with `{"inputs": [...]}` and reads back one vector per input. Requires the
/// `HUGGINGFACEHUB_API_TOKEN` environment variable.
pub struct HuggingFaceEmbedder {
    model: String,
    url: String,
    api_token: String,
    dims: Option<usize>,
    client: reqwest::Client,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_token = std::env::var("HUGGINGFACEHUB_API_TOKEN")
            .map_err(|_| anyhow::anyhow!("HUGGINGFACEHUB_API_TOKEN environment variable not set"))?;
        let url = config.url.clone().unwrap_or_else(|| {
            format!(
                "https://api-inference.huggingface.co/pipeline/feature-extraction/{}",
                config.model
            )
        });
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url,
            api_token,
            dims: config.dims,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Hugging Face API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let vectors = parse_vector_array(&json)?;
        ensure_vector_count(&vectors, texts.len())?;
        Ok(vectors)
    }
}

/// One vector per input text, or the provider response is unusable.
fn ensure_vector_count(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        bail!(
            "embedding count mismatch: sent {} texts, got {} vectors",
            expected,
            vectors.len()
        );
    }
    Ok(())
}

/// Parse a JSON array of float arrays into vectors.
fn parse_vector_array(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let rows = json
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: expected an array"))?;

    let mut vectors = Vec::with_capacity(rows.len());
    for row in rows {
        let values = row
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: expected a vector"))?;
        vectors.push(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(vectors)
}

// ============ OpenAI provider ============

/// Embedding via the OpenAI embeddings API.
///
/// Sends batched `POST /v1/embeddings` requests with the configured model.
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIEmbedder {
    model: String,
    url: String,
    api_key: String,
    dims: Option<usize>,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/embeddings".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url,
            api_key,
            dims: config.dims,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let vectors = parse_openai_response(&json)?;
        ensure_vector_count(&vectors, texts.len())?;
        Ok(vectors)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays and returns them in order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
