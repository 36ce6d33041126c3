use ahash::AHashSet;
use common::{Item, ItemId, ProductField, RankError, Result, check_search_args};
use tracing::info;

use crate::{
    fusion::ScoredId,
    retrieval::{Retriever, select_top_k},
};

/// Text-to-vector model. The model itself lives outside this crate.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Exact nearest-neighbour search by inner product over item embeddings.
/// With `normalize` set, vectors are L2-normalized and the score is cosine.
pub struct DenseIndex<E> {
    ids: Vec<ItemId>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
    embedder: E,
    normalize: bool,
}

impl<E: Embedder> DenseIndex<E> {
    /// Embeds `name + " " + description` of every item.
    pub fn fit(corpus: &[Item], embedder: E, normalize: bool) -> Result<Self> {
        let texts = corpus.iter().map(embedding_text).collect::<Vec<_>>();
        let vectors = embedder.embed(&texts)?;
        let ids = corpus.iter().map(|item| item.id).collect::<Vec<_>>();
        let index = Self::from_embeddings(ids, vectors, embedder, normalize)?;
        info!(items = index.ids.len(), dim = index.dim, "dense index built");
        Ok(index)
    }

    /// Wraps precomputed item embeddings; `vectors[i]` belongs to `ids[i]`.
    pub fn from_embeddings(
        ids: Vec<ItemId>,
        mut vectors: Vec<Vec<f32>>,
        embedder: E,
        normalize: bool,
    ) -> Result<Self> {
        if vectors.len() != ids.len() {
            return Err(RankError::Embedding(format!(
                "expected {} embeddings, got {}",
                ids.len(),
                vectors.len()
            )));
        }
        let mut seen = AHashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(RankError::invalid(format!("duplicate item id {dup} in corpus")));
        }
        let dim = vectors.first().map_or(0, Vec::len);
        if vectors.iter().any(|v| v.len() != dim) {
            return Err(RankError::invalid("item embeddings differ in dimension"));
        }
        if normalize {
            vectors.iter_mut().for_each(|v| l2_normalize(v));
        }
        Ok(Self {
            ids,
            vectors,
            dim,
            embedder,
            normalize,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        check_search_args(query, k)?;
        let mut query_vector = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RankError::Embedding("no vector returned for query".to_string()))?;
        if !self.ids.is_empty() && query_vector.len() != self.dim {
            return Err(RankError::Embedding(format!(
                "query vector has dimension {}, index has {}",
                query_vector.len(),
                self.dim
            )));
        }
        if self.normalize {
            l2_normalize(&mut query_vector);
        }
        let scores = self
            .vectors
            .iter()
            .map(|v| dot(v, &query_vector))
            .collect::<Vec<_>>();
        Ok(select_top_k(&self.ids, &scores, k, true))
    }
}

impl<E: Embedder> Retriever for DenseIndex<E> {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredId>> {
        Self::search(self, query, k)
    }
}

fn embedding_text(item: &Item) -> String {
    let name = item.field(ProductField::Name).unwrap_or_default();
    let description = item.field(ProductField::Description).unwrap_or_default();
    format!("{name} {description}").trim().to_string()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
