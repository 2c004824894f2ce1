use thiserror::Error;

/// Errors surfaced by the answering pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("question cannot be empty")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] rag_retrieval::RetrievalError),

    #[error("generation failed: {0}")]
    Llm(#[from] llm_router::LlmError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
