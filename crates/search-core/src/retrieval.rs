use std::sync::Arc;

use common::{ItemId, RankError, Result, RetrievalDefaults, check_search_args};
use tracing::debug;

use crate::fusion::{DEFAULT_RRF_SMOOTHING, ScoredId, check_smoothing, check_weight, fuse};

/// Anything that turns a query into a ranked candidate list.
///
/// Implementations hold an immutable fitted snapshot, so one instance can
/// serve concurrent searches from many threads.
pub trait Retriever: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>>;

    fn search_ids(&self, query: &str, k: usize) -> Result<Vec<ItemId>> {
        Ok(self.search(query, k)?.into_iter().map(|s| s.id).collect())
    }
}

impl<R: Retriever + ?Sized> Retriever for Arc<R> {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        (**self).search(query, k)
    }
}

impl<R: Retriever + ?Sized> Retriever for &R {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        (**self).search(query, k)
    }
}

struct Source {
    name: String,
    retriever: Arc<dyn Retriever>,
    depth: usize,
    weight: f32,
}

/// Fuses the candidate lists of several retrievers with RRF. Each source is
/// asked for its own fixed candidate depth regardless of the requested `k`.
pub struct HybridRetriever {
    sources: Vec<Source>,
    smoothing: f32,
}

impl HybridRetriever {
    pub fn new(smoothing: f32) -> Result<Self> {
        check_smoothing(smoothing)?;
        Ok(Self {
            sources: Vec::new(),
            smoothing,
        })
    }

    pub fn lexical_semantic(
        lexical: Arc<dyn Retriever>,
        semantic: Arc<dyn Retriever>,
        defaults: &RetrievalDefaults,
    ) -> Result<Self> {
        Self::new(defaults.rrf_smoothing)?
            .with_source("lexical", lexical, defaults.lexical_candidates)?
            .with_source("semantic", semantic, defaults.semantic_candidates)
    }

    pub fn with_source(
        self,
        name: impl Into<String>,
        retriever: Arc<dyn Retriever>,
        depth: usize,
    ) -> Result<Self> {
        self.with_weighted_source(name, retriever, depth, 1.0)
    }

    /// Adds a source asked for `depth` candidates per search, its reciprocal
    /// ranks scaled by `weight`.
    pub fn with_weighted_source(
        mut self,
        name: impl Into<String>,
        retriever: Arc<dyn Retriever>,
        depth: usize,
        weight: f32,
    ) -> Result<Self> {
        let name = name.into();
        if depth == 0 {
            return Err(RankError::invalid(format!(
                "candidate depth for source {name} must be at least 1"
            )));
        }
        check_weight(weight)?;
        self.sources.push(Source {
            name,
            retriever,
            depth,
            weight,
        });
        Ok(self)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Default for HybridRetriever {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            smoothing: DEFAULT_RRF_SMOOTHING,
        }
    }
}

impl Retriever for HybridRetriever {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        check_search_args(query, k)?;
        let mut rankings = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let ids = source.retriever.search_ids(query, source.depth)?;
            debug!(source = %source.name, candidates = ids.len(), "hybrid source ranked");
            rankings.push((ids, source.weight));
        }
        let borrowed = rankings
            .iter()
            .map(|(ids, weight)| (ids.as_slice(), *weight))
            .collect::<Vec<_>>();
        Ok(fuse(&borrowed, k, self.smoothing))
    }
}

/// Top `k` by score descending, ties by ascending id. With `keep_unmatched`
/// false, items scoring zero or less are left out.
pub(crate) fn select_top_k(
    ids: &[ItemId],
    scores: &[f32],
    k: usize,
    keep_unmatched: bool,
) -> Vec<ScoredId> {
    if k == 0 {
        return Vec::new();
    }
    let mut ranked = ids
        .iter()
        .zip(scores)
        .filter(|&(_, &score)| keep_unmatched || score > 0.0)
        .map(|(&id, &score)| ScoredId { id, score })
        .collect::<Vec<_>>();
    let by_rank =
        |a: &ScoredId, b: &ScoredId| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id));
    if ranked.len() > k {
        ranked.select_nth_unstable_by(k - 1, by_rank);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by(by_rank);
    ranked
}
