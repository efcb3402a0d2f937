//! `ragctx chunk`: Preview how a document would be chunked.

use std::path::Path;

use ragctx_context::SentenceChunker;
use serde::Serialize;

use super::{load_config, token_counter};

#[derive(Serialize)]
struct ChunkView<'a> {
    index: usize,
    token_count: usize,
    text: &'a str,
}

pub async fn run(
    config_path: Option<&Path>,
    file: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(size) = chunk_size {
        config.chunking.chunk_size_tokens = size;
    }
    if let Some(overlap) = overlap {
        config.chunking.overlap_tokens = overlap;
    }
    config.validate()?;

    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;

    let counter = token_counter(&config);
    let chunker = SentenceChunker::from_config(counter.clone(), &config.chunking);
    let chunks = chunker.chunk_text(&text);

    let views: Vec<ChunkView> = chunks
        .iter()
        .enumerate()
        .map(|(index, text)| ChunkView {
            index,
            token_count: counter.count_tokens(text),
            text,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    println!(
        "📄 {} chunk(s) from {} (size {}, overlap {}, counter: {})",
        views.len(),
        file.display(),
        config.chunking.chunk_size_tokens,
        config.chunking.overlap_tokens,
        counter.method()
    );
    for view in &views {
        println!();
        println!("── chunk {} · {} tokens ──", view.index, view.token_count);
        println!("{}", view.text);
    }

    Ok(())
}
