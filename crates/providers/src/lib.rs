//! Capability providers for ragctx.
//!
//! Embedders implement `ragctx_core::Embedder`; the Hugging Face tokenizer
//! implements `ragctx_core::Tokenizer`. The factory functions below select
//! an implementation from configuration.

pub mod hashing;
#[cfg(feature = "local")]
pub mod hf;
pub mod http;

use std::sync::Arc;

use ragctx_config::{EmbeddingConfig, TokenizerConfig, TokenizerKind};
use ragctx_core::error::TokenizerError;
use ragctx_core::{Embedder, Error, Tokenizer};

pub use hashing::HashingEmbedder;
#[cfg(feature = "local")]
pub use hf::HfTokenizer;
pub use http::HttpEmbedder;

/// Deferred tokenizer construction, run on first use.
pub type TokenizerLoader = Box<dyn Fn() -> Result<Arc<dyn Tokenizer>, TokenizerError> + Send + Sync>;

/// Build the embedder named by `config.provider`.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, Error> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        "http" => {
            let api_url = config.api_url.clone().ok_or_else(|| Error::Config {
                message: "embedding.api_url is required for the http provider".into(),
            })?;
            let model = config.model.clone().ok_or_else(|| Error::Config {
                message: "embedding.model is required for the http provider".into(),
            })?;
            Ok(Arc::new(HttpEmbedder::new(
                api_url,
                config.api_key.clone(),
                model,
                config.dimensions,
            )))
        }
        other => Err(Error::Config {
            message: format!("Unknown embedding provider '{other}' (expected 'hashing' or 'http')"),
        }),
    }
}

/// A loader for the configured tokenizer, or `None` for whitespace counting.
///
/// Loading is deferred so a missing or unreachable tokenizer only costs
/// anything when tokens are first counted.
pub fn tokenizer_loader(config: &TokenizerConfig) -> Option<TokenizerLoader> {
    match config.kind {
        TokenizerKind::Whitespace => None,
        TokenizerKind::Huggingface => Some(huggingface_loader(config)),
    }
}

#[cfg(feature = "local")]
fn huggingface_loader(config: &TokenizerConfig) -> TokenizerLoader {
    let path = config.path.clone();
    let repo = config.repo.clone();
    Box::new(move || {
        let tokenizer = match (&path, &repo) {
            (Some(path), _) => HfTokenizer::from_file(path)?,
            (None, Some(repo)) => HfTokenizer::from_hub(repo)?,
            (None, None) => {
                return Err(TokenizerError::Unavailable(
                    "tokenizer.path or tokenizer.repo must be set".into(),
                ));
            }
        };
        Ok(Arc::new(tokenizer) as Arc<dyn Tokenizer>)
    })
}

#[cfg(not(feature = "local"))]
fn huggingface_loader(_config: &TokenizerConfig) -> TokenizerLoader {
    Box::new(|| {
        Err(TokenizerError::Unavailable(
            "built without the 'local' feature".into(),
        ))
    })
}
