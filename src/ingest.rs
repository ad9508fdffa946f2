//! Document ingestion: PDF bytes in, indexed chunks out.
//!
//! An [`Ingestor`] remembers every source identifier it has been given and
//! skips repeats for the life of the process. The identifier is marked seen
//! before any parsing starts, so a document that fails halfway is not
//! silently retried on the next call; restart the process or pick a fresh
//! identifier to try again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use walkdir::WalkDir;

use crate::chunk;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{create_embedder, Embedder};
use crate::extract;
use crate::index::{create_index, VectorIndex};
use crate::models::{IndexEntry, IngestReport};

/// The `ingest` command: files and directories from the command line.
///
/// With `--dry-run` every document is extracted and chunked but nothing is
/// embedded or indexed, and no credentials are needed.
pub async fn run_ingest(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    let ingestor = if dry_run {
        println!("ingest (dry-run)");
        None
    } else {
        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.index)?;
        index.prepare().await?;
        println!("ingest");
        Some(Ingestor::new(embedder, index, config))
    };

    let mut reports = Vec::new();
    for path in paths {
        if path.is_dir() {
            match &ingestor {
                Some(ingestor) => {
                    for report in ingestor.add_dir(path).await? {
                        print_report(&report);
                        reports.push(report);
                    }
                }
                None => {
                    for pdf in pdf_paths(path)? {
                        let report = plan_file(&pdf, &config.chunking)?;
                        print_report(&report);
                        reports.push(report);
                    }
                }
            }
        } else {
            let report = match &ingestor {
                Some(ingestor) => {
                    let source = source_name(path)?;
                    ingestor.add_file(&source, path).await?
                }
                None => plan_file(path, &config.chunking)?,
            };
            print_report(&report);
            reports.push(report);
        }
    }

    let ingested = reports.iter().filter(|r| !r.skipped).count();
    let skipped = reports.len() - ingested;
    let chunks: usize = reports.iter().map(|r| r.chunks).sum();
    if dry_run {
        println!("  files planned: {}", ingested);
        println!("  estimated chunks: {}", chunks);
    } else {
        println!("  files ingested: {}", ingested);
        if skipped > 0 {
            println!("  files skipped: {}", skipped);
        }
        println!("  chunks indexed: {}", chunks);
    }
    println!("ok");
    Ok(())
}

fn plan_file(path: &Path, chunking: &ChunkingConfig) -> Result<IngestReport> {
    let source = source_name(path)?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    plan_bytes(&source, &bytes, chunking)
}

fn print_report(report: &IngestReport) {
    if report.skipped {
        println!("  {}: already ingested, skipped", report.source);
    } else {
        println!(
            "  {}: {} pages, {} chunks",
            report.source, report.pages, report.chunks
        );
    }
}

pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    batch_size: usize,
    seen: Mutex<HashSet<String>>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, config: &Config) -> Self {
        Self {
            embedder,
            index,
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Ingest one PDF file under the given source identifier.
    pub async fn add_file(&self, source: &str, path: &Path) -> Result<IngestReport> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.add_bytes(source, &bytes).await
    }

    /// Ingest PDF bytes under the given source identifier.
    ///
    /// A repeated identifier skips all work and reports `skipped = true`,
    /// whether or not the earlier attempt succeeded.
    pub async fn add_bytes(&self, source: &str, bytes: &[u8]) -> Result<IngestReport> {
        if !self.seen.lock().unwrap().insert(source.to_string()) {
            tracing::info!(source, "already ingested, skipping");
            return Ok(IngestReport::already_ingested(source));
        }

        if !extract::looks_like_pdf(bytes) {
            bail!("'{}' is not a PDF", source);
        }
        let pages = extract::extract_pdf_pages(bytes)?;
        let chunks = chunk::chunk_pages(source, &pages, &self.chunking);

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if let Some(dims) = self.embedder.dims() {
                if let Some(vector) = vectors.iter().find(|v| v.len() != dims) {
                    bail!(
                        "embedding dimensionality mismatch: expected {}, got {}",
                        dims,
                        vector.len()
                    );
                }
            }
            let ingested_at = Utc::now().to_rfc3339();
            for (chunk, vector) in batch.iter().zip(vectors) {
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    vector,
                    ingested_at: ingested_at.clone(),
                });
            }
        }

        let report = IngestReport {
            source: source.to_string(),
            pages: pages.len(),
            chunks: entries.len(),
            skipped: false,
        };
        self.index.insert(entries).await?;
        tracing::info!(
            source,
            pages = report.pages,
            chunks = report.chunks,
            "ingested document"
        );
        Ok(report)
    }

    /// Walk a directory and ingest every `*.pdf` file, each under its file
    /// name. Stops at the first document that fails.
    pub async fn add_dir(&self, dir: &Path) -> Result<Vec<IngestReport>> {
        let paths = pdf_paths(dir)?;
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let source = source_name(&path)?;
            let report = self
                .add_file(&source, &path)
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;
            reports.push(report);
        }
        Ok(reports)
    }
}

/// Dry-run: extract and chunk without embedding, indexing, or marking the
/// identifier seen.
pub fn plan_bytes(source: &str, bytes: &[u8], chunking: &ChunkingConfig) -> Result<IngestReport> {
    if !extract::looks_like_pdf(bytes) {
        bail!("'{}' is not a PDF", source);
    }
    let pages = extract::extract_pdf_pages(bytes)?;
    let chunks = chunk::chunk_pages(source, &pages, chunking);
    Ok(IngestReport {
        source: source.to_string(),
        pages: pages.len(),
        chunks: chunks.len(),
        skipped: false,
    })
}

/// All `*.pdf` files under `dir`, recursively, in sorted order.
pub fn pdf_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_pdf = entry
            .path()
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

/// The file-name component of a path, used as the default source identifier.
pub fn source_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("Invalid document path: {}", path.display()))
}
