//! Relevance floor applied after merging and before hydration.

use ragctx_core::RetrievalHit;
use tracing::debug;

/// Drops hits scoring below a minimum. A minimum `<= 0.0` passes
/// everything through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceFilter {
    min_score: f32,
}

impl RelevanceFilter {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }

    /// Keep hits with `score >= min_score`, preserving order.
    pub fn apply(&self, hits: Vec<RetrievalHit>) -> Vec<RetrievalHit> {
        if self.min_score <= 0.0 {
            return hits;
        }

        let before = hits.len();
        let kept: Vec<RetrievalHit> = hits
            .into_iter()
            .filter(|h| h.score >= self.min_score)
            .collect();

        if kept.len() < before {
            debug!(
                min_score = self.min_score,
                dropped = before - kept.len(),
                kept = kept.len(),
                "Relevance floor applied"
            );
        }
        kept
    }
}
