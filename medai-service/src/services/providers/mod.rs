//! AI provider abstractions and implementations.
//!
//! The orchestrator talks to a single [`AiProvider`]; Gemini is the production
//! backend and the mock backs tests and local runs without an API key.

pub mod gemini;
pub mod mock;

use crate::models::ChatTurn;
use async_trait::async_trait;
use service_core::retry::Retryable;
use std::time::Duration;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::NetworkError(_) => "network",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::MalformedResponse(_) => "malformed",
        }
    }

    /// Message safe to hand back to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => "The AI service is busy. Please try again shortly.",
            ProviderError::ContentFiltered => "The request was blocked by the AI safety filter.",
            ProviderError::Timeout(_) => "The AI service took too long to respond.",
            ProviderError::MalformedResponse(_) => "The AI service returned an invalid response.",
            _ => "Could not reach the AI service.",
        }
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited
                | ProviderError::Unavailable(_)
                | ProviderError::NetworkError(_)
        )
    }
}

/// A single chat completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    /// Ask the backend for `application/json` output.
    pub json_output: bool,
}

/// Trait for chat and embedding providers (e.g., Gemini).
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Generate the model's reply text.
    async fn chat_complete(&self, request: &ChatCompletionRequest) -> Result<String, ProviderError>;

    /// Embed one text into a vector of `dimensions` values.
    async fn embed(
        &self,
        model: &str,
        text: &str,
        dimensions: usize,
    ) -> Result<Vec<f32>, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
