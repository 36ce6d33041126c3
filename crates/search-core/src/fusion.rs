//! Reciprocal Rank Fusion.
//!
//! Each source adds `weight / (smoothing + rank)` for every item it ranks
//! (1-based), so lists with incomparable score scales merge on position alone.
//! Fused scores say nothing about either source's native scores.

use ahash::AHashMap;
use common::{ItemId, RankError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RRF_SMOOTHING: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: ItemId,
    pub score: f32,
}

pub fn ids(ranked: &[ScoredId]) -> Vec<ItemId> {
    ranked.iter().map(|s| s.id).collect()
}

/// Unweighted fusion of any number of rankings. Ties keep first-seen order
/// (earlier source first, then earlier rank).
///
/// `smoothing` must be finite and non-negative; a negative value lets a rank
/// divide by zero. Use [`rrf_fuse_weighted`] when the value is not trusted.
pub fn rrf_fuse<R: AsRef<[ItemId]>>(rankings: &[R], k: usize, smoothing: f32) -> Vec<ScoredId> {
    debug_assert!(
        smoothing.is_finite() && smoothing >= 0.0,
        "rrf smoothing must be finite and non-negative, got {smoothing}"
    );
    let weighted = rankings
        .iter()
        .map(|ranking| (ranking.as_ref(), 1.0))
        .collect::<Vec<_>>();
    fuse(&weighted, k, smoothing)
}

/// Fusion with a per-source weight multiplying every contribution.
pub fn rrf_fuse_weighted(
    rankings: &[(&[ItemId], f32)],
    k: usize,
    smoothing: f32,
) -> Result<Vec<ScoredId>> {
    check_smoothing(smoothing)?;
    for (_, weight) in rankings {
        check_weight(*weight)?;
    }
    Ok(fuse(rankings, k, smoothing))
}

pub(crate) fn check_smoothing(smoothing: f32) -> Result<()> {
    if !smoothing.is_finite() || smoothing < 0.0 {
        return Err(RankError::invalid(format!(
            "rrf smoothing must be finite and non-negative, got {smoothing}"
        )));
    }
    Ok(())
}

pub(crate) fn check_weight(weight: f32) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(RankError::invalid(format!(
            "source weight must be finite and non-negative, got {weight}"
        )));
    }
    Ok(())
}

/// Callers validate `smoothing` and weights first.
pub(crate) fn fuse(rankings: &[(&[ItemId], f32)], k: usize, smoothing: f32) -> Vec<ScoredId> {
    // id -> (score, first-seen position)
    let mut scores: AHashMap<ItemId, (f32, usize)> = AHashMap::new();

    for (ranking, weight) in rankings {
        for (rank, id) in ranking.iter().enumerate() {
            let rr = weight / (smoothing + (rank + 1) as f32);
            let seen = scores.len();
            scores.entry(*id).or_insert((0.0, seen)).0 += rr;
        }
    }

    let mut fused = scores
        .into_iter()
        .map(|(id, (score, seen))| (seen, ScoredId { id, score }))
        .collect::<Vec<_>>();
    fused.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
    fused.truncate(k);
    fused.into_iter().map(|(_, scored)| scored).collect()
}
