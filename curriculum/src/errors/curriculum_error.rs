//! Error types for the curriculum crate.

use thiserror::Error;

/// Errors raised by the prerequisite graph and catalog helpers.
#[derive(Debug, Error)]
pub enum CurriculumError {
    /// Inserting the topic with these prerequisites would close a
    /// dependency cycle. The graph is left unchanged.
    #[error("adding '{topic}' with prerequisites {prerequisites:?} would create a cycle")]
    CircularDependency {
        topic: String,
        prerequisites: Vec<String>,
    },

    /// JSON (de)serialization failure for the graph map form.
    #[error("graph json: {0}")]
    Json(#[from] serde_json::Error),
}
