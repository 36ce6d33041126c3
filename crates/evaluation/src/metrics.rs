//! Order-aware ranking metrics truncated to the top `k` predictions.
//!
//! Predicted ids missing from the ground truth count as gain 0 and ground-truth
//! ids that were never predicted are simply never hit. Every metric is 0.0
//! for `k == 0`, empty predictions or ground truth without any relevant item.

use ahash::{AHashMap, AHashSet};
use common::ItemId;

/// Item id to graded gain for one query.
pub type GradedRelevance = AHashMap<ItemId, f64>;

/// Mean average precision with binary relevance.
///
/// A relevant id repeated in the predictions counts once. The denominator is
/// `min(|truth|, k)`, so the score stays within `[0, 1]` even when there are
/// more relevant items than slots; this caps rather than penalizes short lists.
pub fn map_at_k(truth: &[ItemId], predicted: &[ItemId], k: usize) -> f64 {
    if truth.is_empty() || predicted.is_empty() || k == 0 {
        return 0.0;
    }
    let relevant = truth.iter().copied().collect::<AHashSet<_>>();
    let mut counted = AHashSet::new();
    let mut hits = 0.0;
    let mut score = 0.0;
    for (i, id) in predicted.iter().take(k).enumerate() {
        if relevant.contains(id) && counted.insert(*id) {
            hits += 1.0;
            score += hits / (i + 1) as f64;
        }
    }
    score / relevant.len().min(k) as f64
}

/// Average precision over graded gains: partially relevant items add
/// proportionally instead of counting as misses.
///
/// The result moves with how generously the "partial" grade is assigned
/// upstream; a lax labeling policy inflates it.
pub fn soft_ap_at_k(graded: &GradedRelevance, predicted: &[ItemId], k: usize) -> f64 {
    if predicted.is_empty() || k == 0 {
        return 0.0;
    }
    let denom = ideal_gains(graded, k).iter().sum::<f64>();
    if denom <= 0.0 {
        return 0.0;
    }
    let mut cumulative = 0.0;
    let mut score = 0.0;
    for (i, id) in predicted.iter().take(k).enumerate() {
        let gain = gain_of(graded, id);
        cumulative += gain;
        score += (cumulative / (i + 1) as f64) * gain;
    }
    score / denom
}

pub fn dcg_at_k(graded: &GradedRelevance, predicted: &[ItemId], k: usize) -> f64 {
    discounted(predicted.iter().take(k).map(|id| gain_of(graded, id)))
}

pub fn ndcg_at_k(graded: &GradedRelevance, predicted: &[ItemId], k: usize) -> f64 {
    let idcg = discounted(ideal_gains(graded, k).into_iter());
    if idcg <= 0.0 {
        return 0.0;
    }
    dcg_at_k(graded, predicted, k) / idcg
}

fn gain_of(graded: &GradedRelevance, id: &ItemId) -> f64 {
    graded.get(id).copied().unwrap_or(0.0)
}

fn ideal_gains(graded: &GradedRelevance, k: usize) -> Vec<f64> {
    let mut gains = graded.values().copied().collect::<Vec<_>>();
    gains.sort_by(|a, b| b.total_cmp(a));
    gains.truncate(k);
    gains
}

// gain at 1-based rank i is divided by log2(i + 1)
fn discounted(gains: impl Iterator<Item = f64>) -> f64 {
    gains
        .enumerate()
        .map(|(i, gain)| gain / ((i + 2) as f64).log2())
        .sum()
}
