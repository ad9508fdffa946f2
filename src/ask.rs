use anyhow::Result;
use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::assemble;
use crate::retrieve::SearchOptions;

/// One-shot question over the indexed documents.
///
/// Without `--session` a fresh UUID session is minted; it is printed after
/// the answer so the conversation can be continued with a second `ask`.
pub async fn run_ask(
    config: &Config,
    question: &str,
    session: Option<String>,
    source: Option<String>,
    top_k: Option<usize>,
) -> Result<()> {
    let components = assemble(config)?;

    if let Some(k) = top_k {
        let mut options = SearchOptions::from_config(&config.chat);
        options.k = k;
        components.pipeline.retriever().set_options(options)?;
    }

    let session = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    let output = components
        .pipeline
        .query(&session, question, source.as_deref())
        .await?;

    println!("{}", output.answer.trim());

    if !output.sources.is_empty() {
        println!();
        println!("Sources:");
        for hit in &output.sources {
            println!(
                "  [{:.2}] {} p.{}",
                hit.score, hit.chunk.source, hit.chunk.page
            );
        }
    }

    println!();
    println!("session: {}", session);
    Ok(())
}
