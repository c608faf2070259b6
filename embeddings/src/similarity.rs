//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors (or either vector is zero)
/// - -1.0 means opposite vectors
///
/// The result is clamped to absorb floating-point drift.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    // Accumulate in f64; sqrt(n * n) == n exactly, so cos(a, a) is exactly 1.
    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_sq_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum();
    let norm_sq_b: f64 = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum();

    if norm_sq_a == 0.0 || norm_sq_b == 0.0 {
        return Ok(0.0);
    }

    let cosine = dot_product / (norm_sq_a * norm_sq_b).sqrt();
    Ok((cosine as f32).clamp(-1.0, 1.0))
}

/// Keep items scoring at least `min_score`, order them best first and take
/// the top `k`.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank_top_k<T>(scored: Vec<(T, f32)>, k: usize, min_score: f32) -> Vec<(T, f32)> {
    let mut kept: Vec<(T, f32)> = scored
        .into_iter()
        .filter(|(_, score)| *score >= min_score)
        .collect();

    kept.sort_by_key(|(_, score)| std::cmp::Reverse(OrderedFloat(*score)));
    kept.truncate(k);
    kept
}
