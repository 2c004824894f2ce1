//! Chat model abstraction with complexity-based routing.
//!
//! - [`chat`] — message/response types shared by every client
//! - [`model::ChatModel`] — dyn-safe async generation trait
//! - [`services`] — Ollama and OpenAI-compatible cloud clients
//! - [`complexity`] — rule-based question complexity scoring
//! - [`router::ModelRouter`] — cheapest-capable model selection with
//!   ordered fallback on failure

pub mod chat;
pub mod complexity;
pub mod errors;
pub mod model;
pub mod router;
pub mod services;

pub use chat::{ChatMessage, ChatRole, LlmResponse};
pub use complexity::{ComplexityAnalyzer, ComplexityLevel};
pub use errors::llm_error::LlmError;
pub use model::{ChatModel, TextStream};
pub use router::{ModelRouter, RoutedResponse};
pub use services::cloud_chat::{CloudChat, CloudProvider};
pub use services::ollama_chat::OllamaChat;
