//! Environment-driven retrieval settings.

use std::env;

use crate::errors::retrieval_error::{RetrievalError, Result};

/// Settings for the retrieval stack, loaded from the environment.
///
/// Every field has a default; `QDRANT_URL` is the only optional knob
/// with no fallback value (absent means "use the in-memory store").
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Qdrant gRPC endpoint; `None` selects the in-memory store.
    pub qdrant_url: Option<String>,
    /// Qdrant collection name.
    pub collection: String,
    /// Ollama embedding model.
    pub embedding_model: String,
    /// Embedding vector dimension; must match the model.
    pub embedding_dimension: usize,
    /// Token cap applied before embedding.
    pub embedding_max_tokens: usize,
    /// Ollama base URL (embeddings and local generation).
    pub ollama_url: String,
    /// Request timeout for embedding calls, seconds.
    pub embedding_timeout_secs: u64,
    /// Default number of chunks per retrieval.
    pub top_k: usize,
    /// Minimum relevance score for prerequisite-aware retrieval.
    pub min_relevance_score: f32,
    /// Semantic share of hybrid fusion, `0.0..=1.0`.
    pub semantic_weight: f32,
    /// How many prerequisite levels to walk.
    pub prerequisite_depth: usize,
    /// Score multiplier applied to prerequisite chunks.
    pub prerequisite_weight: f32,
    /// Chunks fetched per prerequisite topic.
    pub n_prerequisite_results: usize,
    /// Prefer hybrid search when the store supports it.
    pub use_hybrid_search: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qdrant_url: None,
            collection: "calculus_chunks".to_string(),
            embedding_model: "mxbai-embed-large".to_string(),
            embedding_dimension: 1024,
            embedding_max_tokens: 512,
            ollama_url: "http://localhost:11434".to_string(),
            embedding_timeout_secs: 60,
            top_k: 5,
            min_relevance_score: 0.45,
            semantic_weight: 0.7,
            prerequisite_depth: 2,
            prerequisite_weight: 0.8,
            n_prerequisite_results: 2,
            use_hybrid_search: true,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|_| RetrievalError::EnvParse {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

impl RetrievalConfig {
    /// Loads settings from environment variables, falling back to
    /// [`RetrievalConfig::default`] per field.
    ///
    /// # Errors
    /// [`RetrievalError::EnvParse`] on unparsable numeric/bool values,
    /// [`RetrievalError::InvalidConfig`] on out-of-range weights.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            qdrant_url: env_opt("QDRANT_URL"),
            collection: env_or("QDRANT_COLLECTION", &defaults.collection),
            embedding_model: env_or("EMBEDDING_MODEL_NAME", &defaults.embedding_model),
            embedding_dimension: env_parse("VECTOR_DIMENSION", defaults.embedding_dimension)?,
            embedding_max_tokens: env_parse("EMBEDDING_MAX_TOKENS", defaults.embedding_max_tokens)?,
            ollama_url: env_or("OLLAMA_BASE_URL", &defaults.ollama_url),
            embedding_timeout_secs: env_parse(
                "EMBEDDING_TIMEOUT_SECS",
                defaults.embedding_timeout_secs,
            )?,
            top_k: env_parse("RETRIEVAL_TOP_K", defaults.top_k)?,
            min_relevance_score: env_parse("MIN_RELEVANCE_SCORE", defaults.min_relevance_score)?,
            semantic_weight: env_parse("SEMANTIC_WEIGHT", defaults.semantic_weight)?,
            prerequisite_depth: env_parse("PREREQUISITE_DEPTH", defaults.prerequisite_depth)?,
            prerequisite_weight: env_parse("PREREQUISITE_WEIGHT", defaults.prerequisite_weight)?,
            n_prerequisite_results: env_parse(
                "N_PREREQUISITE_RESULTS",
                defaults.n_prerequisite_results,
            )?,
            use_hybrid_search: env_parse("USE_HYBRID_SEARCH", defaults.use_hybrid_search)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.semantic_weight) {
            return Err(RetrievalError::InvalidConfig(format!(
                "semantic_weight {} out of [0, 1]",
                self.semantic_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.prerequisite_weight) {
            return Err(RetrievalError::InvalidConfig(format!(
                "prerequisite_weight {} out of [0, 1]",
                self.prerequisite_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.min_relevance_score) {
            return Err(RetrievalError::InvalidConfig(format!(
                "min_relevance_score {} out of [0, 1]",
                self.min_relevance_score
            )));
        }
        if self.top_k == 0 {
            return Err(RetrievalError::InvalidConfig(
                "top_k must be positive".to_string(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(RetrievalError::InvalidConfig(
                "embedding_dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
