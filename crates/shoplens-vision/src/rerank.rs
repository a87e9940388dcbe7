//! Diversity-aware greedy reranking.
//!
//! Trades raw score against lexical overlap with results already selected,
//! so a top-k list is not five near-identical variants of one product.

use std::collections::HashSet;

/// Default weight applied to the overlap penalty.
pub const DEFAULT_DIVERSITY_WEIGHT: f32 = 0.2;

/// Divisor that scales shared-token counts into a penalty.
const OVERLAP_NORMALIZER: f32 = 10.0;

/// Anything with a score and a label that can be compared lexically.
pub trait Rankable {
    fn rank_score(&self) -> f32;
    fn rank_label(&self) -> &str;
}

/// Lowercased whitespace tokens of a label.
pub fn label_tokens(label: &str) -> HashSet<String> {
    label.split_whitespace().map(str::to_lowercase).collect()
}

/// Sum over `selected` of shared tokens with `candidate`, divided by 10.
pub fn overlap_penalty(candidate: &HashSet<String>, selected: &[HashSet<String>]) -> f32 {
    selected
        .iter()
        .map(|s| candidate.intersection(s).count() as f32 / OVERLAP_NORMALIZER)
        .sum()
}

/// Greedily select up to `top_k` items from `pool`.
///
/// The highest-scored item is always first. Each following pick maximizes
/// `score - diversity_weight * overlap_penalty`; ties go to the earliest item
/// in the remaining pool. When the pool holds no more than `top_k` items it is
/// returned sorted by score, without penalties.
pub fn diversify<T: Rankable>(mut pool: Vec<T>, top_k: usize, diversity_weight: f32) -> Vec<T> {
    pool.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
    if pool.len() <= top_k {
        return pool;
    }
    if top_k == 0 {
        return Vec::new();
    }

    let mut remaining: Vec<(T, HashSet<String>)> = pool
        .into_iter()
        .map(|item| {
            let tokens = label_tokens(item.rank_label());
            (item, tokens)
        })
        .collect();

    let mut selected = Vec::with_capacity(top_k);
    let mut selected_tokens = Vec::with_capacity(top_k);

    let (first, tokens) = remaining.remove(0);
    selected.push(first);
    selected_tokens.push(tokens);

    while selected.len() < top_k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_adjusted = f32::NEG_INFINITY;

        for (idx, (candidate, tokens)) in remaining.iter().enumerate() {
            let adjusted = candidate.rank_score()
                - diversity_weight * overlap_penalty(tokens, &selected_tokens);
            if adjusted > best_adjusted {
                best_adjusted = adjusted;
                best_idx = idx;
            }
        }

        let (picked, tokens) = remaining.remove(best_idx);
        tracing::trace!(
            label = picked.rank_label(),
            adjusted = best_adjusted,
            "diversity pick"
        );
        selected.push(picked);
        selected_tokens.push(tokens);
    }

    selected
}
