//! The chat model contract.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::chat::{ChatMessage, LlmResponse};
use crate::errors::llm_error::LlmError;

/// Stream of generated text fragments.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Dyn-safe async chat model. Implemented by the Ollama client, the cloud
/// client, and [`crate::router::ModelRouter`] itself.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable model identifier.
    fn model_name(&self) -> String;

    /// Generate one complete answer for the conversation.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmResponse, LlmError>;

    /// Generate an answer as a stream of text fragments.
    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<TextStream, LlmError>;
}
