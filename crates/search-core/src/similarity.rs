/// Per-field text similarity for one query against every item of a fitted corpus.
pub trait FieldSimilarity: Send + Sync {
    /// One raw score per corpus item, in corpus order.
    fn scores(&self, query: &str) -> Vec<f32>;
}

impl<F> FieldSimilarity for F
where
    F: Fn(&str) -> Vec<f32> + Send + Sync,
{
    fn scores(&self, query: &str) -> Vec<f32> {
        self(query)
    }
}

/// Rescales to `[0, 1]` using the vector's own min and max. A flat vector
/// (zero range) becomes all zeros.
pub fn min_max_normalize(scores: &mut [f32]) {
    let Some((min, max)) = min_max(scores) else {
        return;
    };
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        scores.fill(0.0);
        return;
    }
    for score in scores.iter_mut() {
        *score = (*score - min) / range;
    }
}

fn min_max(scores: &[f32]) -> Option<(f32, f32)> {
    let first = *scores.first()?;
    Some(
        scores
            .iter()
            .fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s))),
    )
}
