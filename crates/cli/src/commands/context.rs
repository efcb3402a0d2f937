//! `ragctx context`: Assemble the bounded prompt context for a message.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragctx_context::{ContextRequest, QueryPipeline};
use ragctx_core::ConversationTurn;
use ragctx_memory::FileStore;

use super::{load_config, token_counter};

pub struct Args {
    pub domain: String,
    pub message: String,
    pub history: Option<PathBuf>,
    pub system_prompt: String,
    pub file_ids: Vec<String>,
}

fn read_history(path: &Path) -> Result<Vec<ConversationTurn>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read history {}: {e}", path.display()))?;
    let turns = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid history JSON in {}: {e}", path.display()))?;
    Ok(turns)
}

pub async fn run(config_path: Option<&Path>, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let history = match &args.history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };

    let store = Arc::new(FileStore::open(config.store_dir()));
    let embedder = ragctx_providers::embedder_from_config(&config.embedding)?;
    let pipeline = QueryPipeline::from_config(&config, token_counter(&config), embedder, store.clone(), store);

    let assembled = pipeline
        .assemble(ContextRequest {
            domain: args.domain,
            system_prompt: args.system_prompt,
            history,
            user_message: args.message,
            document_ids: args.file_ids,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&assembled)?);
    Ok(())
}
