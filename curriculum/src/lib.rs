//! Calculus curriculum model: topic catalog, prerequisite DAG, and gap
//! detection over free-text student questions.
//!
//! ## Public API
//! - [`topics`] — the static topic catalog and [`topics::build_prerequisite_graph`]
//! - [`graph::PrerequisiteGraph`] — DAG with closure/sort/learning-path queries
//! - [`detector::GapDetector`] — query → topic detection + gap analysis

pub mod detector;
pub mod errors;
pub mod graph;
pub mod topics;

pub use detector::{GapAnalysis, GapDetector};
pub use errors::curriculum_error::CurriculumError;
pub use graph::PrerequisiteGraph;
pub use topics::{
    Topic, all_topics, build_prerequisite_graph, search_topics, topic_info, topics_by_difficulty,
};
