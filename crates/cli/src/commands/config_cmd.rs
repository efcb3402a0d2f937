//! `ragctx config`: Configuration management commands.

use std::path::Path;

use ragctx_config::AppConfig;

use super::load_config;

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.retrieval.min_score <= 0.0 {
                warnings.push("retrieval.min_score <= 0 disables the relevance floor");
            }

            let fixed_caps = config.budget.max_history_tokens + config.budget.max_retrieval_tokens;
            if fixed_caps > config.budget.max_input_tokens {
                warnings.push("History and retrieval caps together exceed max_input_tokens; aggregate trimming will apply");
            }

            if config.embedding.provider == "http" && config.embedding.api_key.is_none() {
                warnings.push("No embedding API key set (set RAGCTX_EMBEDDING_API_KEY)");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!(
                "   Chunking:   {} tokens, {} overlap",
                config.chunking.chunk_size_tokens, config.chunking.overlap_tokens
            );
            println!(
                "   Retrieval:  top_k {}, min_score {}, domains [{}]",
                config.retrieval.top_k,
                config.retrieval.min_score,
                config.retrieval.base_domains.join(", ")
            );
            println!(
                "   Budget:     history {}, retrieval {}, input {}, output {}",
                config.budget.max_history_tokens,
                config.budget.max_retrieval_tokens,
                config.budget.max_input_tokens,
                config.budget.max_output_tokens
            );
            println!("   Prompts:    {} domain focus entries", config.prompts.domains.len());
            println!("   Embedding:  {}", config.embedding.provider);
            println!("   Store:      {}", config.store_dir().display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_toml());
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };
    println!("{}", path.display());
    Ok(())
}
