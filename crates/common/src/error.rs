pub type Result<T, E = RankError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    /// No usable signal could be built, or a configuration value is out of range.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("embedding provider failed: {0}")]
    Embedding(String),
}

impl RankError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Shared guard for every `search(query, k)` entry point.
pub fn check_search_args(query: &str, k: usize) -> Result<()> {
    if k == 0 {
        return Err(RankError::invalid("k must be at least 1"));
    }
    if query.trim().is_empty() {
        return Err(RankError::invalid("query text must be non-empty"));
    }
    Ok(())
}
