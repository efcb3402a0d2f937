//! Offline feature-hashing embedder.
//!
//! Each lowercase alphanumeric term is hashed with SHA-256 into one of
//! `dimensions` buckets with a ±1 sign, and the resulting vector is
//! L2-normalized. Texts sharing vocabulary land close under cosine
//! similarity. No network, no model files, fully deterministic.

use async_trait::async_trait;
use ragctx_core::Embedder;
use ragctx_core::error::EmbeddingError;
use sha2::{Digest, Sha256};

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(term.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn vectors_are_unit_length_and_sized() {
        let e = HashingEmbedder::new(64);
        let v = e.embed_query("Reset your VPN password").await.unwrap();
        assert_eq!(v.len(), 64);
        assert!((dot(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn deterministic_and_case_insensitive() {
        let e = HashingEmbedder::new(128);
        let a = e.embed_query("VPN Token").await.unwrap();
        let b = e.embed_query("vpn token").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let e = HashingEmbedder::new(256);
        let vectors = e
            .embed(&[
                "connect to the vpn with your token".to_string(),
                "vpn token required to connect".to_string(),
                "annual leave approval by manager".to_string(),
            ])
            .await
            .unwrap();
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn text_without_terms_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        let v = e.embed_query("  ... !!! ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
