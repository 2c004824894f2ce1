//! Retrieval-augmented answering for calculus questions.
//!
//! Glues the retrieval stack to a chat model: retrieve supporting
//! chunks (prerequisite-aware when configured), build a grounded
//! prompt, generate or stream the answer.

pub mod errors;
pub mod pipeline;

pub use errors::pipeline_error::PipelineError;
pub use pipeline::{QueryOptions, RagPipeline, RagResponse};
