//! Complexity-based model routing with ordered fallback.
//!
//! Models register with the highest complexity tier they handle. A
//! question is scored once, answered by the cheapest capable
//! non-fallback model, and retried on each fallback model in
//! registration order if the primary fails. Streaming never falls back.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::chat::{ChatMessage, ChatRole, LlmResponse};
use crate::complexity::{ComplexityAnalyzer, ComplexityLevel};
use crate::errors::llm_error::{LlmError, Result};
use crate::model::{ChatModel, TextStream};

/// One registered model.
pub struct ModelBinding {
    pub llm: Arc<dyn ChatModel>,
    pub name: String,
    pub max_complexity: ComplexityLevel,
    pub is_fallback: bool,
}

/// A generated response paired with the label of the model that
/// produced it. On fallback the label is `"{primary}→{fallback}"`.
#[derive(Debug)]
pub struct RoutedResponse {
    pub response: LlmResponse,
    pub model_used: String,
}

/// Routes conversations to registered models by question complexity.
pub struct ModelRouter {
    models: Vec<ModelBinding>,
    analyzer: ComplexityAnalyzer,
    enable_fallback: bool,
    last_model_used: RwLock<Option<String>>,
}

impl ModelRouter {
    pub fn new(enable_fallback: bool) -> Self {
        Self {
            models: Vec::new(),
            analyzer: ComplexityAnalyzer::new(),
            enable_fallback,
            last_model_used: RwLock::new(None),
        }
    }

    /// Register a model. Bindings are kept sorted ascending by
    /// `max_complexity`; registration order is preserved within a tier,
    /// and fallbacks are tried in registration order.
    pub fn add_model(
        &mut self,
        llm: Arc<dyn ChatModel>,
        name: impl Into<String>,
        max_complexity: ComplexityLevel,
        is_fallback: bool,
    ) {
        self.models.push(ModelBinding {
            llm,
            name: name.into(),
            max_complexity,
            is_fallback,
        });
        // Stable sort keeps insertion order within equal tiers.
        self.models.sort_by_key(|m| m.max_complexity);
    }

    /// Label of the model used by the most recent call.
    ///
    /// Convenience for single-caller setups; concurrent callers should
    /// read [`RoutedResponse::model_used`] instead.
    pub fn last_model_used(&self) -> Option<String> {
        self.read_last()
    }

    fn read_last(&self) -> Option<String> {
        match self.last_model_used.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_last(&self, label: String) {
        match self.last_model_used.write() {
            Ok(mut guard) => *guard = Some(label),
            Err(poisoned) => *poisoned.into_inner() = Some(label),
        }
    }

    /// The question is the content of the last user message.
    fn extract_question(messages: &[ChatMessage]) -> &str {
        messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Cheapest capable non-fallback model, or the most capable binding
    /// overall when none qualifies.
    fn select_model(&self, complexity: ComplexityLevel) -> Result<&ModelBinding> {
        let last = self.models.last().ok_or(LlmError::NoModelsConfigured)?;

        Ok(self
            .models
            .iter()
            .find(|m| !m.is_fallback && m.max_complexity >= complexity)
            .unwrap_or(last))
    }

    /// Generate a response with the routed model, falling back in
    /// registration order when the primary fails.
    pub async fn route_generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<RoutedResponse> {
        let question = Self::extract_question(messages);
        let complexity = self.analyzer.analyze(question);
        let primary = self.select_model(complexity)?;
        self.set_last(primary.name.clone());

        debug!(
            target: "llm_router::router",
            model = %primary.name,
            complexity = complexity.as_str(),
            "routing question"
        );

        let primary_err = match primary.llm.generate(messages, temperature, max_tokens).await {
            Ok(mut response) => {
                response
                    .metadata
                    .insert("router_model".to_string(), json!(primary.name));
                response
                    .metadata
                    .insert("router_complexity".to_string(), json!(complexity.as_str()));
                return Ok(RoutedResponse {
                    response,
                    model_used: primary.name.clone(),
                });
            }
            Err(e) => e,
        };

        if !self.enable_fallback {
            return Err(LlmError::PrimaryFailed {
                model: primary.name.clone(),
                source: Box::new(primary_err),
            });
        }

        for fallback in self.models.iter().filter(|m| m.is_fallback) {
            let label = format!("{}→{}", primary.name, fallback.name);
            self.set_last(label.clone());
            warn!(
                target: "llm_router::router",
                primary = %primary.name,
                fallback = %fallback.name,
                error = %primary_err,
                "primary model failed, trying fallback"
            );

            match fallback.llm.generate(messages, temperature, max_tokens).await {
                Ok(mut response) => {
                    response
                        .metadata
                        .insert("router_model".to_string(), json!(fallback.name));
                    response
                        .metadata
                        .insert("router_fallback_from".to_string(), json!(primary.name));
                    response.metadata.insert(
                        "router_primary_error".to_string(),
                        json!(primary_err.to_string()),
                    );
                    info!(
                        target: "llm_router::router",
                        model = %fallback.name,
                        "fallback model answered"
                    );
                    return Ok(RoutedResponse {
                        response,
                        model_used: label,
                    });
                }
                Err(fallback_err) => {
                    warn!(
                        target: "llm_router::router",
                        fallback = %fallback.name,
                        error = %fallback_err,
                        "fallback model failed"
                    );
                }
            }
        }

        Err(LlmError::AllModelsFailed {
            model: primary.name.clone(),
            source: Box::new(primary_err),
        })
    }

    /// Stream from the routed model. No fallback: fragments may already
    /// have been yielded when a failure surfaces.
    pub async fn route_generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<TextStream> {
        let question = Self::extract_question(messages);
        let complexity = self.analyzer.analyze(question);
        let selected = self.select_model(complexity)?;
        self.set_last(selected.name.clone());

        selected
            .llm
            .generate_stream(messages, temperature, max_tokens)
            .await
            .map_err(|e| LlmError::StreamFailed {
                model: selected.name.clone(),
                source: Box::new(e),
            })
    }
}

#[async_trait]
impl ChatModel for ModelRouter {
    fn model_name(&self) -> String {
        match self.read_last() {
            Some(last) => format!("Router(last_used={last})"),
            None => "Router(no_models)".to_string(),
        }
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmResponse> {
        self.route_generate(messages, temperature, max_tokens)
            .await
            .map(|routed| routed.response)
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<TextStream> {
        self.route_generate_stream(messages, temperature, max_tokens)
            .await
    }
}
