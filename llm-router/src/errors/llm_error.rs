//! Unified error type for chat clients and the router.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by chat clients and [`crate::router::ModelRouter`].
#[derive(Debug, Error)]
pub enum LlmError {
    /// The router has no models registered.
    #[error("no models configured in router")]
    NoModelsConfigured,

    /// Invalid endpoint (empty or missing http/https).
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The named cloud provider is not in the provider table.
    #[error("unsupported cloud provider: {0}")]
    UnsupportedProvider(String),

    /// Transport/HTTP client error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from upstream.
    #[error("unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        /// Short snippet of the response body.
        snippet: String,
    },

    /// Unexpected/invalid JSON response.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The provider answered with no choices.
    #[error("model '{model}' returned an empty response")]
    EmptyResponse { model: String },

    /// The selected primary model failed and fallback was disabled.
    #[error("primary model '{model}' failed: {source}")]
    PrimaryFailed {
        model: String,
        #[source]
        source: Box<LlmError>,
    },

    /// Every registered model failed; carries the primary error.
    #[error("all models failed; primary '{model}': {source}")]
    AllModelsFailed {
        model: String,
        #[source]
        source: Box<LlmError>,
    },

    /// A streaming request failed. Streams are never retried on a
    /// fallback model.
    #[error("model '{model}' streaming failed: {source}")]
    StreamFailed {
        model: String,
        #[source]
        source: Box<LlmError>,
    },
}

/// Result alias for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;
