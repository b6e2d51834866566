//! Cached generation of questions and flashcards.
//!
//! A request is identified by a hash of everything that shapes the output. A
//! stored batch for that key is served without touching quota or the provider;
//! otherwise the feature quota is consumed, the provider is asked for JSON, and
//! the result is persisted only after it parses and validates. A generation
//! that fails after the consume hands the use back.

use super::metrics;
use super::orchestrator::AiOrchestrator;
use super::prompts::{self, FlashcardPrompt, QuestionPrompt};
use super::quota::{QuotaDecision, QuotaService};
use super::store::DataStore;
use super::validation;
use crate::models::{
    ContextKey, Difficulty, Flashcard, FlashcardDifficulty, GeneratedContent, GenerationMode,
    GenerationRequest, Question, QuestionType, QuotaKind, StoredContent,
};
use chrono::Utc;
use serde::Serialize;
use service_core::error::AppError;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generated content failed validation: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::QuotaExceeded(msg) => AppError::TooManyRequests(msg, None),
            ContentError::Generation(msg) => AppError::BadGateway(msg),
            ContentError::Validation(_) => {
                AppError::BadGateway("generated content failed validation".to_string())
            }
            ContentError::Storage(e) => e,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentBatch<T> {
    pub items: Vec<T>,
    pub cached: bool,
    /// Feature quota left after this call; absent for cache hits.
    pub uses_left: Option<i64>,
}

impl<T> ContentBatch<T> {
    fn cached(items: Vec<T>) -> Self {
        Self {
            items,
            cached: true,
            uses_left: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuestionParams {
    pub node_id: String,
    pub topic: String,
    pub ai_context: Option<String>,
    pub mode: GenerationMode,
    /// Overrides the default difficulty recipe for standard and kahoot modes.
    pub needed_difficulties: Option<Vec<Difficulty>>,
    pub forced_types: Option<Vec<QuestionType>>,
}

impl QuestionParams {
    /// Ordered difficulties to generate and the question types allowed.
    pub fn recipe(&self) -> (Vec<Difficulty>, Vec<QuestionType>) {
        use Difficulty::*;

        let difficulties = match (self.mode, &self.needed_difficulties) {
            (GenerationMode::Boss, _) => [vec![Medium; 5], vec![Hard; 5]].concat(),
            (_, Some(needed)) => needed.clone(),
            (GenerationMode::Kahoot, None) => vec![Medium, Medium, Hard, Hard, Hard],
            (GenerationMode::Standard, None) => vec![Easy, Medium, Medium, Hard, Hard],
        };

        let types = match (self.mode, &self.forced_types) {
            (GenerationMode::Kahoot, _) => vec![QuestionType::MultipleChoice],
            (_, Some(forced)) if !forced.is_empty() => forced.clone(),
            _ => QuestionType::ALL.to_vec(),
        };

        (difficulties, types)
    }
}

#[derive(Debug, Clone)]
pub struct FlashcardParams {
    pub topic: String,
    pub details: Option<String>,
    pub references: Option<String>,
    pub difficulty: FlashcardDifficulty,
    pub amount: usize,
}

fn normalize_topic(topic: &str) -> String {
    topic.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Stable hash over the parts that shape a generation.
fn identity_key(kind: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for part in parts {
        hasher.update([0u8]);
        hasher.update(part.as_bytes());
    }
    format!("{}:{}", kind, hex::encode(hasher.finalize()))
}

pub fn question_identity_key(
    params: &QuestionParams,
    difficulties: &[Difficulty],
    types: &[QuestionType],
    expand_distractors: bool,
) -> String {
    let difficulties: Vec<&str> = difficulties.iter().map(Difficulty::as_str).collect();
    let types: Vec<&str> = types.iter().map(QuestionType::as_str).collect();
    let topic = normalize_topic(&params.topic);
    let difficulties = difficulties.join(",");
    let types = types.join(",");

    identity_key(
        "questions",
        &[
            params.node_id.trim(),
            topic.as_str(),
            params.ai_context.as_deref().map(str::trim).unwrap_or(""),
            params.mode.as_str(),
            difficulties.as_str(),
            types.as_str(),
            if expand_distractors { "expanded" } else { "plain" },
        ],
    )
}

pub fn flashcard_identity_key(params: &FlashcardParams) -> String {
    let topic = normalize_topic(&params.topic);
    let amount = params.amount.to_string();
    identity_key(
        "flashcards",
        &[
            topic.as_str(),
            params.details.as_deref().map(str::trim).unwrap_or(""),
            params.references.as_deref().map(str::trim).unwrap_or(""),
            params.difficulty.as_str(),
            amount.as_str(),
        ],
    )
}

/// Providers sometimes wrap the array in an object; accept `{ "<key>": [...] }`.
fn unwrap_array(data: serde_json::Value, key: &str) -> serde_json::Value {
    match data {
        serde_json::Value::Object(mut map) if map.contains_key(key) => {
            map.remove(key).unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn DataStore>,
    quota: QuotaService,
    orchestrator: AiOrchestrator,
    question_model: String,
    flashcard_model: String,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn DataStore>,
        quota: QuotaService,
        orchestrator: AiOrchestrator,
        question_model: String,
        flashcard_model: String,
    ) -> Self {
        Self {
            store,
            quota,
            orchestrator,
            question_model,
            flashcard_model,
        }
    }

    async fn consume(&self, user_id: &str, kind: QuotaKind) -> Result<QuotaDecision, ContentError> {
        let decision = self.quota.check_and_consume(user_id, kind).await?;
        if !decision.allowed {
            return Err(ContentError::QuotaExceeded(format!(
                "Daily {} generation limit reached",
                kind
            )));
        }
        Ok(decision)
    }

    async fn generate_json(
        &self,
        user_id: &str,
        request: GenerationRequest,
    ) -> Result<serde_json::Value, ContentError> {
        let result = self.orchestrator.ask_ai(user_id, request).await;
        if !result.success {
            return Err(ContentError::Generation(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        result
            .data
            .ok_or_else(|| ContentError::Generation("empty AI response".to_string()))
    }

    #[instrument(skip(self, params), fields(topic = %params.topic, mode = ?params.mode))]
    pub async fn get_or_generate_questions(
        &self,
        user_id: &str,
        params: &QuestionParams,
    ) -> Result<ContentBatch<Question>, ContentError> {
        let (difficulties, types) = params.recipe();
        if difficulties.is_empty() {
            return Ok(ContentBatch {
                items: Vec::new(),
                cached: false,
                uses_left: None,
            });
        }

        let expand_distractors = self
            .store
            .get_profile(user_id)
            .await?
            .map(|p| p.expand_distractors)
            .unwrap_or(false);
        let key = question_identity_key(params, &difficulties, &types, expand_distractors);

        if let Some(stored) = self.store.get_content(&key).await? {
            if let GeneratedContent::Questions(items) = stored.content {
                if items.len() >= difficulties.len() {
                    metrics::record_cache_lookup("questions", true);
                    tracing::info!(node_id = %params.node_id, count = items.len(), "Serving cached questions");
                    return Ok(ContentBatch::cached(items));
                }
            }
        }
        metrics::record_cache_lookup("questions", false);

        let decision = self.consume(user_id, QuotaKind::Question).await?;
        let questions = match self
            .generate_questions(user_id, params, key, &difficulties, &types, expand_distractors)
            .await
        {
            Ok(questions) => questions,
            Err(e) => {
                self.quota.refund(user_id, &decision).await;
                return Err(e);
            }
        };

        tracing::info!(node_id = %params.node_id, count = questions.len(), "Generated questions");
        Ok(ContentBatch {
            items: questions,
            cached: false,
            uses_left: Some(decision.uses_left),
        })
    }

    /// Prompt, parse, validate and persist one question batch.
    async fn generate_questions(
        &self,
        user_id: &str,
        params: &QuestionParams,
        key: String,
        difficulties: &[Difficulty],
        types: &[QuestionType],
        expand_distractors: bool,
    ) -> Result<Vec<Question>, ContentError> {
        let prompt = prompts::question_prompt(&QuestionPrompt {
            topic: &params.topic,
            ai_context: params.ai_context.as_deref(),
            mode: params.mode,
            difficulties,
            types,
            expand_distractors,
        });
        let request = GenerationRequest::new(ContextKey::QuestionGenerator, prompt)
            .with_model(self.question_model.clone())
            .expect_json()
            .without_quota();

        let data = unwrap_array(self.generate_json(user_id, request).await?, "questions");
        let mut questions: Vec<Question> = serde_json::from_value(data)
            .map_err(|e| ContentError::Validation(vec![format!("schema: {}", e)]))?;

        if questions.len() < difficulties.len() {
            return Err(ContentError::Validation(vec![format!(
                "expected {} questions, got {}",
                difficulties.len(),
                questions.len()
            )]));
        }
        questions.truncate(difficulties.len());

        let mut problems = Vec::new();
        for (index, (question, difficulty)) in questions.iter_mut().zip(difficulties).enumerate() {
            question.difficulty = *difficulty;
            question.xp_reward = difficulty.xp_reward();

            let report = validation::validate_question(question, types);
            if report.warning_count() > 0 {
                tracing::debug!(index, warnings = report.warning_count(), "Question has quality warnings");
            }
            problems.extend(
                report
                    .critical_messages()
                    .into_iter()
                    .map(|m| format!("question {}: {}", index + 1, m)),
            );
        }
        if !problems.is_empty() {
            tracing::warn!(node_id = %params.node_id, issues = ?problems, "Rejected generated questions");
            return Err(ContentError::Validation(problems));
        }

        self.store
            .put_content(&StoredContent {
                identity_key: key,
                topic: params.topic.clone(),
                node_id: Some(params.node_id.clone()),
                content: GeneratedContent::Questions(questions.clone()),
                created_at: Utc::now(),
            })
            .await?;

        Ok(questions)
    }

    #[instrument(skip(self, params), fields(topic = %params.topic, amount = params.amount))]
    pub async fn get_or_generate_flashcards(
        &self,
        user_id: &str,
        params: &FlashcardParams,
    ) -> Result<ContentBatch<Flashcard>, ContentError> {
        if params.amount == 0 {
            return Ok(ContentBatch {
                items: Vec::new(),
                cached: false,
                uses_left: None,
            });
        }

        let key = flashcard_identity_key(params);

        if let Some(stored) = self.store.get_content(&key).await? {
            if let GeneratedContent::Flashcards(items) = stored.content {
                if !items.is_empty() {
                    metrics::record_cache_lookup("flashcards", true);
                    return Ok(ContentBatch::cached(items));
                }
            }
        }
        metrics::record_cache_lookup("flashcards", false);

        let decision = self.consume(user_id, QuotaKind::Flashcard).await?;
        let cards = match self.generate_flashcards(user_id, params, key).await {
            Ok(cards) => cards,
            Err(e) => {
                self.quota.refund(user_id, &decision).await;
                return Err(e);
            }
        };

        Ok(ContentBatch {
            items: cards,
            cached: false,
            uses_left: Some(decision.uses_left),
        })
    }

    /// Prompt, parse, clean and persist one flashcard batch.
    async fn generate_flashcards(
        &self,
        user_id: &str,
        params: &FlashcardParams,
        key: String,
    ) -> Result<Vec<Flashcard>, ContentError> {
        let prompt = prompts::flashcard_prompt(&FlashcardPrompt {
            topic: &params.topic,
            details: params.details.as_deref(),
            references: params.references.as_deref(),
            difficulty: params.difficulty,
            amount: params.amount,
        });
        let request = GenerationRequest::new(ContextKey::FlashcardCreator, prompt)
            .with_model(self.flashcard_model.clone())
            .expect_json()
            .without_quota();

        let data = unwrap_array(self.generate_json(user_id, request).await?, "cards");
        let raw: Vec<Flashcard> = serde_json::from_value(data)
            .map_err(|e| ContentError::Validation(vec![format!("schema: {}", e)]))?;
        let raw_count = raw.len();

        let mut cards = validation::clean_flashcards(raw);
        if cards.is_empty() {
            return Err(ContentError::Validation(vec![format!(
                "none of {} generated cards passed validation",
                raw_count
            )]));
        }
        cards.truncate(params.amount);

        self.store
            .put_content(&StoredContent {
                identity_key: key,
                topic: params.topic.clone(),
                node_id: None,
                content: GeneratedContent::Flashcards(cards.clone()),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(topic = %params.topic, kept = cards.len(), raw = raw_count, "Generated flashcards");
        Ok(cards)
    }
}
