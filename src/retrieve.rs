//! Retrieval stage: query embedding plus nearest-neighbour search.
//!
//! A [`Retriever`] owns its embedder and index handles and is constructed
//! once at startup with explicit [`SearchOptions`]. Reconfiguration is an
//! explicit [`Retriever::set_options`] call; nothing is rebuilt lazily
//! behind an accessor.

use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};

use crate::config::ChatConfig;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::ScoredChunk;

/// How a retrieval runs: the search mode, result count, and optional source
/// restriction.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Search mode. Only `"similarity"` is supported.
    pub search_type: String,
    /// Number of chunks to retrieve.
    pub k: usize,
    /// Restrict results to chunks from this source document.
    pub source: Option<String>,
}

impl SearchOptions {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            search_type: config.search_type.clone(),
            k: config.top_k,
            source: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.search_type != "similarity" {
            bail!(
                "Unknown search type: '{}'. Only similarity is supported.",
                self.search_type
            );
        }
        if self.k == 0 {
            bail!("search k must be > 0");
        }
        Ok(())
    }
}

/// Embeds queries and searches the vector index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    options: RwLock<SearchOptions>,
}

impl Retriever {
    /// Build a retriever over the given embedder and index. Rejects
    /// unsupported options up front.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        options: SearchOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            embedder,
            index,
            options: RwLock::new(options),
        })
    }

    /// Replace the search options for subsequent calls.
    pub fn set_options(&self, options: SearchOptions) -> Result<()> {
        options.validate()?;
        *self.options.write().unwrap() = options;
        Ok(())
    }

    /// Embed the query and return the nearest chunks, best first, at most
    /// `k` of them.
    ///
    /// A `source` given here overrides the configured source filter for this
    /// call only.
    pub async fn retrieve(&self, query: &str, source: Option<&str>) -> Result<Vec<ScoredChunk>> {
        let (k, configured_source) = {
            let options = self.options.read().unwrap();
            (options.k, options.source.clone())
        };
        let filter = source.map(str::to_string).or(configured_source);

        let vector = self.embedder.embed(query).await?;
        self.index.search(&vector, k, filter.as_deref()).await
    }
}
