//! Hugging Face `tokenizers` adapter.
//!
//! Loads a `tokenizer.json` either from a local path or from a Hugging Face
//! Hub repository (downloaded and cached by `hf-hub`).

use std::path::Path;

use hf_hub::api::sync::Api;
use ragctx_core::Tokenizer;
use ragctx_core::error::TokenizerError;
use tracing::info;

pub struct HfTokenizer {
    name: String,
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            TokenizerError::Unavailable(format!("Failed to load tokenizer from {}: {e}", path.display()))
        })?;
        Ok(Self {
            name: format!("huggingface:{}", path.display()),
            inner,
        })
    }

    pub fn from_hub(repo: &str) -> Result<Self, TokenizerError> {
        let api = Api::new()
            .map_err(|e| TokenizerError::Unavailable(format!("Failed to initialize HF Hub API: {e}")))?;

        info!(repo, "Fetching tokenizer from Hugging Face Hub");
        let path = api.model(repo.to_string()).get("tokenizer.json").map_err(|e| {
            TokenizerError::Unavailable(format!("Failed to download tokenizer from '{repo}': {e}"))
        })?;

        let mut tokenizer = Self::from_file(&path)?;
        tokenizer.name = format!("huggingface:{repo}");
        Ok(tokenizer)
    }
}

impl Tokenizer for HfTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| TokenizerError::EncodeFailed(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }
}
