pub mod cloud_chat;
pub mod ollama_chat;
