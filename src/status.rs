use anyhow::Result;

use crate::config::Config;
use crate::index::create_index;

/// Print the configured providers and probe the vector index.
///
/// Needs no API tokens: models are reported from configuration and only the
/// index readiness endpoint is contacted.
pub async fn run_status(config: &Config) -> Result<()> {
    println!(
        "embedding:  {} ({})",
        config.embedding.model, config.embedding.provider
    );
    println!(
        "generation: {} ({})",
        config.generation.model, config.generation.provider
    );
    match config.index.provider.as_str() {
        "weaviate" => println!(
            "index:      weaviate at {} (collection {})",
            config.index.url, config.index.collection
        ),
        other => println!("index:      {}", other),
    }

    let index = create_index(&config.index)?;
    match index.ready().await {
        Ok(()) => println!("index status: ready"),
        Err(err) => println!("index status: unreachable ({:#})", err),
    }
    Ok(())
}
