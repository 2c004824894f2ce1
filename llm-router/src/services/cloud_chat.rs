//! OpenAI-compatible chat client for cloud providers.
//!
//! Ships a small provider table (OpenRouter, DeepSeek, Ollama Cloud) and
//! talks to `/chat/completions`; any other OpenAI-compatible endpoint can
//! be reached via an explicit base URL.

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

/// Supported cloud providers and their chat-completions endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    OpenRouter,
    DeepSeek,
    OllamaCloud,
}

impl CloudProvider {
    /// Parse the provider name used in configuration.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "openrouter" => Ok(Self::OpenRouter),
            "deepseek" => Ok(Self::DeepSeek),
            "ollama-cloud" => Ok(Self::OllamaCloud),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
            Self::OllamaCloud => "ollama-cloud",
        }
    }

    fn chat_url(&self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            Self::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
            Self::OllamaCloud => "https://cloud.ollama.ai/v1/chat/completions",
        }
    }
}

/// Chat client for one cloud-hosted model.
pub struct CloudChat {
    client: reqwest::Client,
    model: String,
    provider: CloudProvider,
    url: String,
    api_key: String,
}

impl CloudChat {
    /// Creates a new client. `base_url` overrides the provider's default
    /// endpoint when set.
    ///
    /// # Errors
    /// - [`LlmError::InvalidEndpoint`] if the override URL is not http(s)
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        provider: CloudProvider,
        timeout_secs: u64,
        base_url: Option<String>,
    ) -> Result<Self> {
        let url = match base_url {
            Some(url) => {
                let trimmed = url.trim();
                if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                    return Err(LlmError::InvalidEndpoint(url));
                }
                trimmed.trim_end_matches('/').to_string()
            }
            None => provider.chat_url().to_string(),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            model: model.into(),
            provider,
            url,
            api_key: api_key.into(),
        })
    }

    async fn post(&self, body: &CompletionsRequest<'_>) -> Result<reqwest::Response> {
        debug!(
            target: "llm_router::cloud",
            provider = self.provider.as_str(),
            "POST {}", self.url
        );

        let mut req = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body);

        // OpenRouter attributes traffic via these headers.
        if self.provider == CloudProvider::OpenRouter {
            req = req
                .header("HTTP-Referer", "https://github.com/calculus-tutor")
                .header("X-Title", "Calculus Tutor");
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url.clone();
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
impl ChatModel for CloudChat {
    fn model_name(&self) -> String {
        format!("Cloud-{}", self.model)
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmResponse> {
        let body = CompletionsRequest {
            model: &self.model,
            messages: messages.to_vec(),
            temperature,
            max_tokens,
            stream: false,
        };
        let resp = self.post(&body).await?;

        let out: CompletionsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("serde error: {e}")))?;

        let Some(choice) = out.choices.into_iter().next() else {
            return Err(LlmError::EmptyResponse {
                model: self.model.clone(),
            });
        };

        let mut metadata = HashMap::new();
        metadata.insert(
            "model".to_string(),
            json!(out.model.unwrap_or_else(|| self.model.clone())),
        );
        metadata.insert("provider".to_string(), json!(self.provider.as_str()));
        metadata.insert("usage".to_string(), json!(out.usage));
        metadata.insert("finish_reason".to_string(), json!(choice.finish_reason));

        Ok(LlmResponse {
            content: choice.message.map(|m| m.content).unwrap_or_default(),
            metadata,
        })
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<TextStream> {
        let body = CompletionsRequest {
            model: &self.model,
            messages: messages.to_vec(),
            temperature,
            max_tokens,
            stream: true,
        };
        let resp = self.post(&body).await?;

        // SSE: `data: {json}` lines, terminated by `data: [DONE]`.
        let mut buf = String::new();
        let mut done = false;
        let stream = resp
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => {
                    if done {
                        return Vec::new();
                    }
                    buf.push_str(&String::from_utf8_lossy(&bytes));
                    let mut out: Vec<Result<String>> = Vec::new();
                    while let Some(pos) = buf.find('\n') {
                        let line = buf[..pos].trim().to_string();
                        buf.drain(..=pos);

                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if data == "[DONE]" {
                            done = true;
                            break;
                        }
                        // Malformed keep-alive fragments are skipped.
                        if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
                            if let Some(choice) = chunk.choices.into_iter().next() {
                                if let Some(content) = choice.delta.content {
                                    if !content.is_empty() {
                                        out.push(Ok(content));
                                    }
                                }
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
struct CompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_table() {
        assert_eq!(
            CloudProvider::parse("openrouter").unwrap(),
            CloudProvider::OpenRouter
        );
        assert_eq!(
            CloudProvider::parse("deepseek").unwrap().chat_url(),
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert!(matches!(
            CloudProvider::parse("anthropic"),
            Err(LlmError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn base_url_override_is_validated() {
        let ok = CloudChat::new(
            "key",
            "deepseek-chat",
            CloudProvider::DeepSeek,
            180,
            Some("https://proxy.internal/v1/chat/completions/".to_string()),
        )
        .unwrap();
        assert_eq!(ok.url, "https://proxy.internal/v1/chat/completions");
        assert_eq!(ok.model_name(), "Cloud-deepseek-chat");

        assert!(matches!(
            CloudChat::new(
                "key",
                "m",
                CloudProvider::DeepSeek,
                180,
                Some("proxy.internal".to_string())
            ),
            Err(LlmError::InvalidEndpoint(_))
        ));
    }
}
