use std::{collections::BTreeMap, fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{ProductField, RankError, normalize_label};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    pub default_top_k: usize,
    pub lexical: LexicalConfig,
    pub gains: LabelGains,
    pub retrieval: RetrievalDefaults,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            lexical: LexicalConfig::default(),
            gains: LabelGains::default(),
            retrieval: RetrievalDefaults::default(),
        }
    }
}

impl RankingConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            Self::default()
        };

        let cfg = cfg.with_overrides(|key| std::env::var(key).ok());
        cfg.validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    /// Applies `RANKING_*` overrides. Unparseable values keep the current setting.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(top_k) = lookup("RANKING_DEFAULT_TOP_K") {
            self.default_top_k = top_k.trim().parse().unwrap_or(self.default_top_k);
        }
        if let Some(smoothing) = lookup("RANKING_RRF_SMOOTHING") {
            self.retrieval.rrf_smoothing = smoothing
                .trim()
                .parse()
                .unwrap_or(self.retrieval.rrf_smoothing);
        }
        self
    }

    pub fn validate(&self) -> Result<(), RankError> {
        if self.default_top_k == 0 {
            return Err(RankError::config("default_top_k must be greater than zero."));
        }
        self.lexical.validate()?;
        self.gains.validate()?;
        self.retrieval.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LexicalConfig {
    pub weights: FieldWeights,
    pub vectorizers: FieldVectorizers,
    /// Pad results up to `k` with zero-score items (ascending id) when the
    /// query matches fewer items.
    pub keep_unmatched: bool,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            vectorizers: FieldVectorizers::default(),
            keep_unmatched: true,
        }
    }
}

impl LexicalConfig {
    pub fn validate(&self) -> Result<(), RankError> {
        self.weights.validate()?;
        for field in ProductField::ALL {
            self.vectorizers.get(field).validate(field)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldWeights {
    pub name: f32,
    pub description: f32,
    pub brand: f32,
    pub category: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            name: 0.65,
            description: 0.35,
            brand: 0.10,
            category: 0.15,
        }
    }
}

impl FieldWeights {
    /// All weights zero; combine with struct update syntax to enable single fields.
    pub const ZERO: Self = Self {
        name: 0.0,
        description: 0.0,
        brand: 0.0,
        category: 0.0,
    };

    pub const fn get(&self, field: ProductField) -> f32 {
        match field {
            ProductField::Name => self.name,
            ProductField::Description => self.description,
            ProductField::Brand => self.brand,
            ProductField::Category => self.category,
        }
    }

    pub fn validate(&self) -> Result<(), RankError> {
        for field in ProductField::ALL {
            let weight = self.get(field);
            if !weight.is_finite() || weight < 0.0 {
                return Err(RankError::config(format!(
                    "weights.{} must be finite and non-negative.",
                    field.as_str()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopWords {
    English,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VectorizerParams {
    pub lowercase: bool,
    pub strip_accents: bool,
    pub stop_words: Option<StopWords>,
    pub ngram_range: (usize, usize),
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
    /// Maximum share of documents a term may appear in, in `(0, 1]`.
    pub max_df: f32,
    pub sublinear_tf: bool,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_accents: true,
            stop_words: None,
            ngram_range: (1, 1),
            min_df: 1,
            max_df: 0.95,
            sublinear_tf: true,
        }
    }
}

impl VectorizerParams {
    pub fn with_ngrams(min: usize, max: usize) -> Self {
        Self {
            ngram_range: (min, max),
            ..Self::default()
        }
    }

    pub fn validate(&self, field: ProductField) -> Result<(), RankError> {
        let (min, max) = self.ngram_range;
        if min == 0 || min > max {
            return Err(RankError::config(format!(
                "vectorizers.{}.ngram_range must satisfy 1 <= min <= max.",
                field.as_str()
            )));
        }
        if self.min_df == 0 {
            return Err(RankError::config(format!(
                "vectorizers.{}.min_df must be at least 1.",
                field.as_str()
            )));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(RankError::config(format!(
                "vectorizers.{}.max_df must be in (0, 1].",
                field.as_str()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldVectorizers {
    pub name: VectorizerParams,
    pub description: VectorizerParams,
    pub brand: VectorizerParams,
    pub category: VectorizerParams,
}

impl Default for FieldVectorizers {
    fn default() -> Self {
        Self {
            name: VectorizerParams::with_ngrams(1, 2),
            description: VectorizerParams::with_ngrams(1, 1),
            brand: VectorizerParams::with_ngrams(1, 1),
            category: VectorizerParams::with_ngrams(1, 2),
        }
    }
}

impl FieldVectorizers {
    pub const fn get(&self, field: ProductField) -> &VectorizerParams {
        match field {
            ProductField::Name => &self.name,
            ProductField::Description => &self.description,
            ProductField::Brand => &self.brand,
            ProductField::Category => &self.category,
        }
    }
}

/// Label string to numeric gain. Lookups are case-insensitive and labels the
/// scheme does not know score 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct GainScheme {
    gains: BTreeMap<String, f64>,
}

impl GainScheme {
    pub fn new<L: AsRef<str>>(gains: impl IntoIterator<Item = (L, f64)>) -> Self {
        Self {
            gains: gains
                .into_iter()
                .map(|(label, gain)| (normalize_label(label.as_ref()), gain))
                .collect(),
        }
    }

    pub fn gain(&self, label: &str) -> f64 {
        self.gains
            .get(&normalize_label(label))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, f64)> {
        self.gains.iter().map(|(label, gain)| (label.as_str(), *gain))
    }

    fn validate(&self, scheme: &str) -> Result<(), RankError> {
        for (label, gain) in self.labels() {
            if !gain.is_finite() || gain < 0.0 {
                return Err(RankError::config(format!(
                    "gains.{scheme}.{label} must be finite and non-negative."
                )));
            }
        }
        Ok(())
    }
}

impl From<BTreeMap<String, f64>> for GainScheme {
    fn from(value: BTreeMap<String, f64>) -> Self {
        Self::new(value)
    }
}

impl From<GainScheme> for BTreeMap<String, f64> {
    fn from(value: GainScheme) -> Self {
        value.gains
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelGains {
    /// Label that marks an item as a correct answer for MAP.
    pub binary_label: String,
    pub soft: GainScheme,
    pub ndcg: GainScheme,
}

impl Default for LabelGains {
    fn default() -> Self {
        Self {
            binary_label: "exact".to_string(),
            soft: GainScheme::new([("exact", 1.0), ("partial", 0.5), ("irrelevant", 0.0)]),
            ndcg: GainScheme::new([("exact", 2.0), ("partial", 1.0), ("irrelevant", 0.0)]),
        }
    }
}

impl LabelGains {
    pub fn validate(&self) -> Result<(), RankError> {
        if self.binary_label.trim().is_empty() {
            return Err(RankError::config("gains.binary_label must be non-empty."));
        }
        self.soft.validate("soft")?;
        self.ndcg.validate("ndcg")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalDefaults {
    pub lexical_candidates: usize,
    pub semantic_candidates: usize,
    pub rrf_smoothing: f32,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            lexical_candidates: 50,
            semantic_candidates: 50,
            rrf_smoothing: 60.0,
        }
    }
}

impl RetrievalDefaults {
    pub fn validate(&self) -> Result<(), RankError> {
        if self.lexical_candidates == 0 || self.semantic_candidates == 0 {
            return Err(RankError::config(
                "retrieval candidate depths must be greater than zero.",
            ));
        }
        if !self.rrf_smoothing.is_finite() || self.rrf_smoothing < 0.0 {
            return Err(RankError::config(
                "retrieval.rrf_smoothing must be finite and non-negative.",
            ));
        }
        Ok(())
    }
}
