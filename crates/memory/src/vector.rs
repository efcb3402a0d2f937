//! Vector similarity utilities.

use ragctx_core::{IndexedVector, score_order};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank candidate vectors by cosine similarity to `query`, best first.
///
/// Ties keep candidate order and NaN scores rank last. At most `limit` pairs are returned.
pub fn rank_by_similarity<'a, I>(candidates: I, query: &[f32], limit: usize) -> Vec<(f32, &'a IndexedVector)>
where
    I: IntoIterator<Item = &'a IndexedVector>,
{
    let mut scored: Vec<(f32, &IndexedVector)> = candidates
        .into_iter()
        .map(|v| (cosine_similarity(&v.vector, query), v))
        .collect();

    scored.sort_by(|a, b| score_order(a.0, b.0));
    scored.truncate(limit);
    scored
}
