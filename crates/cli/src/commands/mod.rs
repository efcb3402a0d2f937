pub mod chunk;
pub mod config_cmd;
pub mod context;
pub mod ingest;

use std::path::Path;
use std::sync::Arc;

use ragctx_config::{AppConfig, ConfigError};
use ragctx_context::{TokenCounter, TokenizerHandle};

/// Load from `path` when given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

/// The process-wide token counter for this configuration.
pub fn token_counter(config: &AppConfig) -> TokenCounter {
    let handle = match ragctx_providers::tokenizer_loader(&config.tokenizer) {
        Some(loader) => TokenizerHandle::lazy(loader),
        None => TokenizerHandle::none(),
    };
    TokenCounter::new(Arc::new(handle))
}
