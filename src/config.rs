use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
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

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Endpoint override; each provider has a sensible default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            url: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "huggingface".to_string()
}
fn default_embedding_model() -> String {
    "sentence-transformers/all-mpnet-base-v2".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_url")]
    pub url: String,
    /// Weaviate class name. Must start with an uppercase letter.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: default_index_url(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "weaviate".to_string()
}
fn default_index_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_collection() -> String {
    "DocChunk".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Endpoint override; each provider has a sensible default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "huggingface".to_string()
}
fn default_generation_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.2".to_string()
}
fn default_max_new_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    1.0
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Number of chunks retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_search_type")]
    pub search_type: String,
    /// Sessions kept in memory; the least-recently-used one is evicted beyond this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// File overriding the built-in prompt template.
    #[serde(default)]
    pub prompt_path: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            search_type: default_search_type(),
            max_sessions: default_max_sessions(),
            prompt_path: None,
        }
    }
}

fn default_top_k() -> usize {
    6
}
fn default_search_type() -> String {
    "similarity".to_string()
}
fn default_max_sessions() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8585".to_string()
}

/// Load and validate the configuration.
///
/// A missing file is not an error: every setting has a built-in default, so
/// a bare environment (credentials in env vars, local Weaviate) works with
/// no config file at all.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "huggingface" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be huggingface or openai.",
            other
        ),
    }

    match config.index.provider.as_str() {
        "weaviate" => {
            if config.index.url.trim().is_empty() {
                anyhow::bail!("index.url must be set when index.provider is 'weaviate'");
            }
            if !config
                .index
                .collection
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase())
            {
                anyhow::bail!("index.collection must start with an uppercase letter");
            }
        }
        "memory" => {}
        other => anyhow::bail!(
            "Unknown index provider: '{}'. Must be weaviate or memory.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "huggingface" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be huggingface or openai.",
            other
        ),
    }
    if config.generation.max_new_tokens == 0 {
        anyhow::bail!("generation.max_new_tokens must be > 0");
    }
    if config.generation.temperature < 0.0 {
        anyhow::bail!("generation.temperature must be >= 0");
    }

    if config.chat.top_k == 0 {
        anyhow::bail!("chat.top_k must be > 0");
    }
    if config.chat.search_type != "similarity" {
        anyhow::bail!(
            "Unknown chat.search_type: '{}'. Only similarity is supported.",
            config.chat.search_type
        );
    }
    if config.chat.max_sessions == 0 {
        anyhow::bail!("chat.max_sessions must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.chat.top_k, 6);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 500

            [index]
            provider = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.index.provider, "memory");
        assert_eq!(config.embedding.model, "sentence-transformers/all-mpnet-base-v2");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("chunk_overlap"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let mut config = Config::default();
        config.embedding.provider = "psychic".to_string();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.index.provider = "pinecone".to_string();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.generation.provider = "carrier-pigeon".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unsupported_search_type_rejected() {
        let mut config = Config::default();
        config.chat.search_type = "mmr".to_string();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("search_type"));
    }

    #[test]
    fn test_collection_must_start_uppercase() {
        let mut config = Config::default();
        config.index.collection = "docChunk".to_string();
        assert!(validate(&config).is_err());
    }
}
