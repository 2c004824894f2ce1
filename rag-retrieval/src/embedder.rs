//! Embedding contract and the Ollama embedder.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::retrieval_error::{RetrievalError, Result};

/// Async text embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of produced vectors.
    fn dimension(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts. Default: sequential calls to [`Embedder::embed`].
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Embedder backed by Ollama's `/api/embeddings` endpoint
/// (mxbai-embed-large by default).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    url: String,
    dimension: usize,
    max_tokens: usize,
}

impl OllamaEmbedder {
    /// Creates a new embedder.
    ///
    /// `max_tokens` caps input length; texts are truncated at roughly
    /// 4 characters per token before embedding.
    ///
    /// # Errors
    /// - [`RetrievalError::InvalidConfig`] on a bad endpoint or zero dim
    /// - [`RetrievalError::Embedding`] if the HTTP client cannot be built
    pub fn new(
        model: impl Into<String>,
        base_url: &str,
        dimension: usize,
        max_tokens: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        let endpoint = base_url.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(RetrievalError::InvalidConfig(format!(
                "invalid embedder endpoint: {base_url}"
            )));
        }
        if dimension == 0 {
            return Err(RetrievalError::InvalidConfig(
                "embedding dimension must be positive".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .brotli(true)
            .build()
            .map_err(|e| RetrievalError::Embedding(format!("client build: {e}")))?;

        Ok(Self {
            client,
            model: model.into(),
            url: format!("{}/api/embeddings", endpoint.trim_end_matches('/')),
            dimension,
            max_tokens,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            // Blank input embeds to the zero vector.
            return Ok(vec![0.0; self.dimension]);
        }

        // Roughly 4 chars per token.
        let max_chars = self.max_tokens * 4;
        let prompt: String = if text.chars().count() > max_chars {
            text.chars().take(max_chars).collect()
        } else {
            text.to_string()
        };

        debug!(target: "rag_retrieval::embedder", model = %self.model, "POST {}", self.url);

        let resp = self
            .client
            .post(&self.url)
            .json(&EmbeddingsRequest {
                model: &self.model,
                prompt: &prompt,
            })
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("transport: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = text.chars().take(240).collect::<String>();
            return Err(RetrievalError::Embedding(format!(
                "HTTP {status} from {}: {snippet}",
                self.url
            )));
        }

        let out: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("decode: {e}")))?;

        if out.embedding.len() != self.dimension {
            return Err(RetrievalError::Embedding(format!(
                "model '{}' returned dim {} but {} expected",
                self.model,
                out.embedding.len(),
                self.dimension
            )));
        }

        Ok(out.embedding)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}
