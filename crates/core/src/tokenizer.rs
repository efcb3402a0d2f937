//! Tokenizer capability.
//!
//! Optional: when no tokenizer is configured, or one fails, token counting
//! falls back to a whitespace word count.

use crate::error::TokenizerError;

/// Turns text into model token ids.
pub trait Tokenizer: Send + Sync {
    /// A short identifier for logs (e.g., "huggingface:bert-base").
    fn name(&self) -> &str;

    /// Encode text without special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;
}
