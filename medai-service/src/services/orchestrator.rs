//! Single entry point for AI calls.
//!
//! Gates chat calls behind the general quota, bounds provider latency and turns
//! every failure into a [`GenerationResult`] instead of an error.

use super::metrics;
use super::prompts;
use super::providers::{AiProvider, ChatCompletionRequest, ProviderError};
use super::quota::{QuotaDecision, QuotaService};
use crate::models::{GenerationRequest, GenerationResult, QuotaKind, ResponseType};
use futures::future::try_join_all;
use service_core::retry::{retry_call, RetryConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub default_model: String,
    /// Models a request may name; anything else is rejected before any call
    pub allowed_models: Vec<String>,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    /// Wall-clock bound for one call, retries included
    pub timeout: Duration,
    pub retry: RetryConfig,
}

#[derive(Clone)]
pub struct AiOrchestrator {
    provider: Arc<dyn AiProvider>,
    quota: QuotaService,
    config: OrchestratorConfig,
}

/// Remove markdown code fences some models wrap JSON output in.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

impl AiOrchestrator {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        quota: QuotaService,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            quota,
            config,
        }
    }

    pub fn embedding_dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    /// Run `operation` with retries, bounded by the configured timeout.
    async fn call_provider<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let provider = self.provider.name();
        let started = Instant::now();

        let result = match tokio::time::timeout(
            self.config.timeout,
            retry_call(&self.config.retry, operation, f),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.timeout)),
        };

        metrics::record_provider_latency(provider, operation, started.elapsed());
        if let Err(e) = &result {
            metrics::record_provider_error(provider, e.kind());
        }
        result
    }

    #[instrument(skip(self, request), fields(context = %request.context_key.as_str()))]
    pub async fn ask_ai(&self, user_id: &str, request: GenerationRequest) -> GenerationResult {
        let context = request.context_key.as_str();

        let model = match request.model_name.as_deref() {
            None => self.config.default_model.clone(),
            Some(name) if self.config.allowed_models.iter().any(|m| m == name) => name.to_string(),
            Some(name) => {
                tracing::warn!(user_id, context, model = %name, "Rejected unsupported model");
                metrics::record_ai_request(context, "rejected");
                return GenerationResult::failure("Unsupported model.");
            }
        };

        let decision = if request.skip_quota {
            None
        } else {
            match self.quota.check_and_consume(user_id, QuotaKind::General).await {
                Ok(decision) if decision.allowed => Some(decision),
                Ok(_) => {
                    metrics::record_ai_request(context, "limit_reached");
                    return GenerationResult::limit_reached();
                }
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Quota check failed, denying AI call");
                    metrics::record_ai_request(context, "error");
                    return GenerationResult::failure("Could not verify your usage quota.");
                }
            }
        };

        let uses_left = decision.as_ref().map(|d| d.uses_left);

        let completion = ChatCompletionRequest {
            model,
            system_instruction: prompts::system_instruction(
                request.context_key,
                request.system_instruction_args.as_deref(),
            ),
            history: request.history,
            message: request.user_message,
            json_output: request.response_type == ResponseType::Json,
        };

        let text = match self
            .call_provider("chat_complete", || self.provider.chat_complete(&completion))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    user_id,
                    context,
                    model = %completion.model,
                    error = %e,
                    "AI call failed"
                );
                metrics::record_ai_request(context, "error");
                return self
                    .refunded_failure(user_id, decision.as_ref(), e.user_message())
                    .await;
            }
        };

        let mut result = GenerationResult::ok(text, uses_left);

        if request.response_type == ResponseType::Json {
            match serde_json::from_str::<serde_json::Value>(strip_code_fences(&result.message)) {
                Ok(data) => result = result.with_data(data),
                Err(e) => {
                    tracing::warn!(user_id, context, error = %e, "AI returned invalid JSON");
                    metrics::record_ai_request(context, "error");
                    return self
                        .refunded_failure(user_id, decision.as_ref(), "Invalid AI response format.")
                        .await;
                }
            }
        }

        metrics::record_ai_request(context, "success");
        result
    }

    /// Failure result for a call that consumed a use; the use is handed back.
    async fn refunded_failure(
        &self,
        user_id: &str,
        decision: Option<&QuotaDecision>,
        message: &str,
    ) -> GenerationResult {
        let mut result = GenerationResult::failure(message);
        if let Some(decision) = decision {
            self.quota.refund(user_id, decision).await;
            result.uses_left = Some(decision.uses_left + 1);
        }
        result
    }

    /// Embed a single text with the configured model and dimensionality.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let model = self.config.embedding_model.as_str();
        let dimensions = self.config.embedding_dimensions;

        let vector = self
            .call_provider("embed", || self.provider.embed(model, text, dimensions))
            .await?;

        if vector.len() != dimensions {
            return Err(ProviderError::MalformedResponse(format!(
                "expected {} dimensions, got {}",
                dimensions,
                vector.len()
            )));
        }
        Ok(vector)
    }

    /// Embed every text concurrently. The i-th vector belongs to the i-th text;
    /// any single failure fails the whole batch.
    #[instrument(skip(self, texts), fields(batch = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let vectors = try_join_all(texts.iter().map(|text| self.embed(text))).await?;

        tracing::debug!(
            count = texts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Embedded batch"
        );
        Ok(vectors)
    }
}
