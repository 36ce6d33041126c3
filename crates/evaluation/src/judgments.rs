use ahash::{AHashMap, AHashSet};
use common::{GainScheme, ItemId, LabelRow, QueryId, normalize_label};

use crate::metrics::GradedRelevance;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub item_id: ItemId,
    /// Normalized (trimmed, lowercased) label.
    pub label: String,
}

/// Human relevance labels grouped by query id.
#[derive(Debug, Clone, Default)]
pub struct Judgments {
    by_query: AHashMap<QueryId, Vec<Judgment>>,
}

impl Judgments {
    pub fn from_rows(rows: impl IntoIterator<Item = LabelRow>) -> Self {
        rows.into_iter().collect()
    }

    pub fn query_count(&self) -> usize {
        self.by_query.len()
    }

    pub fn labels(&self, query_id: QueryId) -> &[Judgment] {
        self.by_query.get(&query_id).map_or(&[], Vec::as_slice)
    }

    /// Items carrying `binary_label`, first-seen order, each id once.
    pub fn binary_truth(&self, query_id: QueryId, binary_label: &str) -> Vec<ItemId> {
        let wanted = normalize_label(binary_label);
        let mut seen = AHashSet::new();
        self.labels(query_id)
            .iter()
            .filter(|j| j.label == wanted && seen.insert(j.item_id))
            .map(|j| j.item_id)
            .collect()
    }

    /// Gain per item under `gains`. Conflicting labels for one item keep the
    /// highest gain; unknown labels count as 0.0.
    pub fn graded(&self, query_id: QueryId, gains: &GainScheme) -> GradedRelevance {
        let mut graded = GradedRelevance::default();
        for judgment in self.labels(query_id) {
            let gain = gains.gain(&judgment.label);
            let entry = graded.entry(judgment.item_id).or_insert(0.0);
            *entry = entry.max(gain);
        }
        graded
    }
}

impl FromIterator<LabelRow> for Judgments {
    fn from_iter<T: IntoIterator<Item = LabelRow>>(iter: T) -> Self {
        let mut by_query: AHashMap<QueryId, Vec<Judgment>> = AHashMap::new();
        for row in iter {
            by_query.entry(row.query_id).or_default().push(Judgment {
                item_id: row.item_id,
                label: normalize_label(&row.label),
            });
        }
        Self { by_query }
    }
}
