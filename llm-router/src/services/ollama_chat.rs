//! Thin chat client for the Ollama API.
//!
//! - `POST {endpoint}/api/chat` with `stream=false` — full answer
//! - `POST {endpoint}/api/chat` with `stream=true`  — line-delimited JSON
//!
//! An optional bearer key covers Ollama-hosted cloud models; local
//! daemons need none.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::chat::{ChatMessage, LlmResponse};
use crate::errors::llm_error::{LlmError, Result};
use crate::model::{ChatModel, TextStream};

/// Chat client for a single Ollama model.
pub struct OllamaChat {
    client: reqwest::Client,
    model: String,
    url_chat: String,
    api_key: Option<String>,
}

impl OllamaChat {
    /// Creates a new client.
    ///
    /// # Errors
    /// - [`LlmError::InvalidEndpoint`] if `base_url` is empty or not http(s)
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(
        model: impl Into<String>,
        base_url: &str,
        timeout_secs: u64,
        api_key: Option<String>,
    ) -> Result<Self> {
        let endpoint = base_url.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::InvalidEndpoint(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .brotli(true)
            .build()?;

        let url_chat = format!("{}/api/chat", endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            model: model.into(),
            url_chat,
            api_key,
        })
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
        stream: bool,
    ) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: messages.to_vec(),
            options: ChatOptions {
                temperature,
                num_predict: max_tokens,
            },
            stream,
        }
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        debug!(target: "llm_router::ollama", "POST {}", self.url_chat);

        let mut req = self.client.post(&self.url_chat).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_chat.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = text.chars().take(240).collect::<String>();
            return Err(LlmError::HttpStatus {
                status,
                url,
                snippet,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmResponse> {
        let body = self.request_body(messages, temperature, max_tokens, false);
        let resp = self.post(&body).await?;

        let out: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("serde error: {e}")))?;

        let mut metadata = HashMap::new();
        metadata.insert(
            "model".to_string(),
            json!(out.model.unwrap_or_else(|| self.model.clone())),
        );
        metadata.insert("total_duration".to_string(), json!(out.total_duration));
        metadata.insert("load_duration".to_string(), json!(out.load_duration));
        metadata.insert(
            "prompt_eval_count".to_string(),
            json!(out.prompt_eval_count),
        );
        metadata.insert("eval_count".to_string(), json!(out.eval_count));

        Ok(LlmResponse {
            content: out.message.map(|m| m.content).unwrap_or_default(),
            metadata,
        })
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<TextStream> {
        let body = self.request_body(messages, temperature, max_tokens, true);
        let resp = self.post(&body).await?;

        // One JSON object per line; objects may span byte chunks.
        let mut buf = String::new();
        let stream = resp
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => {
                    buf.push_str(&String::from_utf8_lossy(&bytes));
                    let mut out: Vec<Result<String>> = Vec::new();
                    while let Some(pos) = buf.find('\n') {
                        let line = buf[..pos].trim().to_string();
                        buf.drain(..=pos);
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ChatResponse>(&line) {
                            Ok(chunk) => {
                                if let Some(msg) = chunk.message {
                                    if !msg.content.is_empty() {
                                        out.push(Ok(msg.content));
                                    }
                                }
                            }
                            Err(e) => {
                                out.push(Err(LlmError::Decode(format!("stream chunk: {e}"))));
                            }
                        }
                    }
                    out
                }
                Err(e) => vec![Err(LlmError::Transport(e))],
            })
            .flat_map(futures::stream::iter)
            .boxed();

        Ok(stream)
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    options: ChatOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Response body for `/api/chat`; the same shape arrives per stream line.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    model: Option<String>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    load_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}
