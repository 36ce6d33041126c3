pub mod fusion;
pub mod lexical;
pub mod retrieval;
pub mod similarity;
pub mod tfidf;
pub mod vector;

pub use fusion::{DEFAULT_RRF_SMOOTHING, ScoredId, rrf_fuse, rrf_fuse_weighted};
pub use lexical::{MultiFieldScorer, WeightedField};
pub use retrieval::{HybridRetriever, Retriever};
pub use similarity::{FieldSimilarity, min_max_normalize};
pub use tfidf::TfidfField;
pub use vector::{DenseIndex, Embedder};
