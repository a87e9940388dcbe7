//! Similarity reduction between embedding sets.
//!
//! A query set of `Nq` vectors and a product set of `Np` vectors produce an
//! `Nq x Np` cosine matrix, reduced to one score per product:
//!
//! - image-only: `0.5*max + 0.35*mean + 0.15*min`
//! - hybrid: `(1-w) * (0.7*max + 0.3*mean) + w * cos(query_text, product_text)`
//!
//! Matrix entries are sorted before summation so the mean, and therefore the
//! score, is bit-identical under any enumeration order of either set.

use serde::{Deserialize, Serialize};

use crate::types::EmbeddingSet;

/// Lower bound for the hybrid text weight.
pub const MIN_TEXT_WEIGHT: f32 = 0.30;
/// Upper bound for the hybrid text weight.
pub const MAX_TEXT_WEIGHT: f32 = 0.40;
/// Default hybrid text weight.
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.35;

/// How the similarity matrix is reduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoreMode {
    #[default]
    ImageOnly,
    Hybrid { text_weight: f32 },
}

impl ScoreMode {
    /// Hybrid mode with `text_weight` clamped into `[0.30, 0.40]`.
    pub fn hybrid(text_weight: f32) -> Self {
        ScoreMode::Hybrid {
            text_weight: text_weight.clamp(MIN_TEXT_WEIGHT, MAX_TEXT_WEIGHT),
        }
    }
}

/// Summary statistics over a similarity matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixStats {
    pub max: f32,
    pub mean: f32,
    pub min: f32,
}

/// Compute cosine similarity between two vectors.
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
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// All pairwise cosine similarities, row-major over `query x product`.
pub fn similarity_matrix(query: &[Vec<f32>], product: &[Vec<f32>]) -> Vec<f32> {
    query
        .iter()
        .flat_map(|q| product.iter().map(move |p| cosine_similarity(q, p)))
        .collect()
}

/// Reduce matrix entries to max/mean/min. Returns `None` for an empty matrix.
pub fn matrix_stats(entries: &[f32]) -> Option<MatrixStats> {
    if entries.is_empty() {
        return None;
    }
    let mut sorted = entries.to_vec();
    sorted.sort_by(f32::total_cmp);

    let sum: f64 = sorted.iter().map(|&x| x as f64).sum();
    Some(MatrixStats {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean: (sum / sorted.len() as f64) as f32,
    })
}

/// Image-only reduction: `0.5*max + 0.35*mean + 0.15*min`.
pub fn image_only_score(stats: &MatrixStats) -> f32 {
    0.5 * stats.max + 0.35 * stats.mean + 0.15 * stats.min
}

/// Image component of the hybrid reduction: `0.7*max + 0.3*mean`.
pub fn hybrid_image_score(stats: &MatrixStats) -> f32 {
    0.7 * stats.max + 0.3 * stats.mean
}

/// Score a product set against a query set.
///
/// In hybrid mode both sets must carry a text embedding; when either is
/// missing the image-only reduction is used instead. Returns `None` when
/// either set is empty.
pub fn score(query: &EmbeddingSet, product: &EmbeddingSet, mode: ScoreMode) -> Option<f32> {
    let stats = matrix_stats(&similarity_matrix(&query.vectors, &product.vectors))?;

    match (mode, query.text.as_deref(), product.text.as_deref()) {
        (ScoreMode::Hybrid { text_weight }, Some(qt), Some(pt)) => {
            let text_sim = cosine_similarity(qt, pt);
            Some((1.0 - text_weight) * hybrid_image_score(&stats) + text_weight * text_sim)
        }
        _ => Some(image_only_score(&stats)),
    }
}
