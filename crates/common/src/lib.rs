pub mod config;
pub mod error;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use config::{
    FieldVectorizers, FieldWeights, GainScheme, LabelGains, LexicalConfig, RankingConfig,
    RetrievalDefaults, StopWords, VectorizerParams,
};
pub use error::{RankError, Result, check_search_args};

pub type ItemId = u64;
pub type QueryId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Name,
    Description,
    Brand,
    Category,
}

impl ProductField {
    pub const ALL: [Self; 4] = [Self::Name, Self::Description, Self::Brand, Self::Category];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Brand => "brand",
            Self::Category => "category",
        }
    }

    /// Text as it should be analyzed. Category paths like `Furniture > Chairs`
    /// lose their separators so path segments tokenize as words.
    pub fn prepare(self, raw: &str) -> String {
        match self {
            Self::Category => raw.replace(['>', '/', '|'], " "),
            _ => raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub fields: BTreeMap<ProductField, String>,
}

impl Item {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: ProductField, text: impl Into<String>) -> Self {
        self.fields.insert(field, text.into());
        self
    }

    pub fn field(&self, field: ProductField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledQuery {
    pub id: QueryId,
    pub text: String,
}

impl LabeledQuery {
    pub fn new(id: QueryId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRow {
    pub query_id: QueryId,
    pub item_id: ItemId,
    pub label: String,
}

impl LabelRow {
    pub fn new(query_id: QueryId, item_id: ItemId, label: impl Into<String>) -> Self {
        Self {
            query_id,
            item_id,
            label: label.into(),
        }
    }
}

/// Label strings compare case-insensitively and ignore surrounding whitespace.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
