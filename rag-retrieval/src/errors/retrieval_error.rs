//! Error types for the retrieval crate.

use thiserror::Error;

/// Errors produced by embedders, stores, and retrievers.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Queries must contain at least one non-whitespace character.
    #[error("query cannot be empty")]
    EmptyQuery,

    /// Required environment variable is missing.
    #[error("missing env variable: {key}")]
    EnvMissing { key: String },

    /// Environment variable present but failed to parse.
    #[error("failed to parse env variable: {key} = '{value}'")]
    EnvParse { key: String, value: String },

    /// Invalid configuration detected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding call failed or produced a wrong-size vector.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Qdrant transport or server error.
    #[error("qdrant error: {0}")]
    Qdrant(String),

    /// Generic store failure.
    #[error("store error: {0}")]
    Store(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Curriculum(#[from] curriculum::CurriculumError),
}

/// Result alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
