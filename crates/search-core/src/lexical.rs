use ahash::AHashSet;
use common::{
    Item, ItemId, LexicalConfig, ProductField, RankError, Result, check_search_args,
};
use tracing::{debug, info, warn};

use crate::{
    fusion::ScoredId,
    retrieval::{Retriever, select_top_k},
    similarity::{FieldSimilarity, min_max_normalize},
    tfidf::TfidfField,
};

pub struct WeightedField {
    pub field: ProductField,
    pub weight: f32,
    pub provider: Box<dyn FieldSimilarity>,
}

impl WeightedField {
    pub fn new(field: ProductField, weight: f32, provider: impl FieldSimilarity + 'static) -> Self {
        Self {
            field,
            weight,
            provider: Box::new(provider),
        }
    }
}

/// Scores items by summing independently min-max normalized per-field
/// similarities, each scaled by its configured weight.
pub struct MultiFieldScorer {
    ids: Vec<ItemId>,
    fields: Vec<WeightedField>,
    keep_unmatched: bool,
}

impl std::fmt::Debug for MultiFieldScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiFieldScorer")
            .field("items", &self.ids.len())
            .field("fields", &self.active_fields())
            .field("keep_unmatched", &self.keep_unmatched)
            .finish()
    }
}

impl MultiFieldScorer {
    /// Fits a TF-IDF provider for every weighted field with content. Fields that
    /// are missing, blank, zero-weighted or left without vocabulary are skipped.
    pub fn fit(corpus: &[Item], config: &LexicalConfig) -> Result<Self> {
        config.validate()?;
        let mut fields = Vec::new();
        for field in ProductField::ALL {
            let weight = config.weights.get(field);
            if weight == 0.0 {
                debug!(field = field.as_str(), "zero weight, field skipped");
                continue;
            }
            let texts = corpus
                .iter()
                .map(|item| item.field(field).map(|t| field.prepare(t)).unwrap_or_default())
                .collect::<Vec<_>>();
            if texts.iter().all(|t| t.trim().is_empty()) {
                debug!(field = field.as_str(), "no content in corpus, field skipped");
                continue;
            }
            match TfidfField::fit(field, &texts, config.vectorizers.get(field))? {
                Some(provider) => {
                    debug!(
                        field = field.as_str(),
                        terms = provider.vocabulary_len(),
                        "field vectorized"
                    );
                    fields.push(WeightedField::new(field, weight, provider));
                }
                None => warn!(
                    field = field.as_str(),
                    "no terms left after document-frequency pruning, field skipped"
                ),
            }
        }

        let ids = corpus.iter().map(|item| item.id).collect();
        let scorer = Self::from_providers(ids, fields, config.keep_unmatched)?;
        info!(
            items = scorer.len(),
            fields = ?scorer.active_fields(),
            "lexical scorer fitted"
        );
        Ok(scorer)
    }

    /// Builds a scorer over externally supplied providers. `ids` gives the
    /// corpus order every provider's score vector must follow.
    pub fn from_providers(
        ids: Vec<ItemId>,
        fields: Vec<WeightedField>,
        keep_unmatched: bool,
    ) -> Result<Self> {
        let mut seen = AHashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(RankError::invalid(format!("duplicate item id {dup} in corpus")));
        }
        if let Some(bad) = fields
            .iter()
            .find(|f| !f.weight.is_finite() || f.weight < 0.0)
        {
            return Err(RankError::config(format!(
                "weight for {} must be finite and non-negative",
                bad.field.as_str()
            )));
        }
        if fields.is_empty() {
            return Err(RankError::config(
                "no usable field: every configured field is missing, empty or unweighted",
            ));
        }
        Ok(Self {
            ids,
            fields,
            keep_unmatched,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn active_fields(&self) -> Vec<ProductField> {
        self.fields.iter().map(|f| f.field).collect()
    }

    /// Weighted sum of normalized field scores, one entry per item in corpus order.
    pub fn fused_scores(&self, query: &str) -> Result<Vec<f32>> {
        let mut fused = vec![0.0_f32; self.ids.len()];
        for field in &self.fields {
            let mut scores = field.provider.scores(query);
            if scores.len() != fused.len() {
                return Err(RankError::config(format!(
                    "{} provider returned {} scores for {} items",
                    field.field.as_str(),
                    scores.len(),
                    fused.len()
                )));
            }
            min_max_normalize(&mut scores);
            for (acc, score) in fused.iter_mut().zip(scores) {
                *acc += field.weight * score;
            }
        }
        Ok(fused)
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        check_search_args(query, k)?;
        let fused = self.fused_scores(query)?;
        let hits = select_top_k(&self.ids, &fused, k, self.keep_unmatched);
        debug!(k, hits = hits.len(), "lexical search");
        Ok(hits)
    }
}

impl Retriever for MultiFieldScorer {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        Self::search(self, query, k)
    }
}
