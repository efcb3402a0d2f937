//! Embedding service trait.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The embedder name (e.g., "hashing", "http").
    fn name(&self) -> &str;

    /// Output vector dimension.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query. Returns an empty vector when the service
    /// produced nothing for it.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }
}
