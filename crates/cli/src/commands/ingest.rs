//! `ragctx ingest`: Chunk, embed and store a document.

use std::path::Path;
use std::sync::Arc;

use ragctx_context::{IngestPipeline, SentenceChunker};
use ragctx_core::DocumentText;
use ragctx_memory::FileStore;

use super::{load_config, token_counter};

pub async fn run(
    config_path: Option<&Path>,
    file: &Path,
    domain: &str,
    id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let id = match id {
        Some(id) => id,
        None => file
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| format!("Cannot derive a document id from {}; pass --id", file.display()))?,
    };

    let store = Arc::new(FileStore::open(config.store_dir()));
    let embedder = ragctx_providers::embedder_from_config(&config.embedding)?;
    let chunker = SentenceChunker::from_config(token_counter(&config), &config.chunking);
    let pipeline = IngestPipeline::from_config(&config, chunker, embedder, store.clone(), store.clone());

    let report = pipeline.ingest(&DocumentText::new(id, domain, text)).await?;

    println!("✅ Ingested '{}' into domain '{}'", report.document_id, report.domain);
    println!("   Chunks:     {}", report.chunks_created);
    if report.chunks_replaced > 0 {
        println!("   Replaced:   {} previous chunk(s)", report.chunks_replaced);
    }
    println!("   Embedding:  {} ms", report.embedding_ms);
    println!("   Indexing:   {} ms", report.index_ms);
    println!("   Store:      {}", store.dir().display());

    Ok(())
}
