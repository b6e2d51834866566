use crate::models::{Difficulty, FlashcardDifficulty, GenerationMode, QuestionType};
use crate::services::{ContentBatch, FlashcardParams, QuestionParams};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateQuestionsRequest {
    #[validate(length(min = 1, max = 200))]
    pub node_id: String,

    #[validate(length(min = 1, max = 500))]
    pub topic: String,

    #[validate(length(max = 5000))]
    pub ai_context: Option<String>,

    #[serde(default)]
    pub mode: GenerationMode,

    /// Replaces the default difficulty ramp for standard and kahoot rounds.
    #[validate(length(max = 20))]
    pub needed_difficulties: Option<Vec<Difficulty>>,

    pub forced_types: Option<Vec<QuestionType>>,
}

impl From<GenerateQuestionsRequest> for QuestionParams {
    fn from(req: GenerateQuestionsRequest) -> Self {
        QuestionParams {
            node_id: req.node_id,
            topic: req.topic,
            ai_context: req.ai_context,
            mode: req.mode,
            needed_difficulties: req.needed_difficulties,
            forced_types: req.forced_types,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateFlashcardsRequest {
    #[validate(length(min = 1, max = 500))]
    pub topic: String,

    #[validate(length(max = 5000))]
    pub details: Option<String>,

    #[validate(length(max = 5000))]
    pub references: Option<String>,

    #[serde(default)]
    pub difficulty: FlashcardDifficulty,

    #[serde(default = "default_amount")]
    #[validate(range(min = 1, max = 50))]
    pub amount: usize,
}

fn default_amount() -> usize {
    10
}

impl From<GenerateFlashcardsRequest> for FlashcardParams {
    fn from(req: GenerateFlashcardsRequest) -> Self {
        FlashcardParams {
            topic: req.topic,
            details: req.details,
            references: req.references,
            difficulty: req.difficulty,
            amount: req.amount,
        }
    }
}

/// Body shared by both content endpoints.
#[derive(Debug, Serialize)]
pub struct ContentResponse<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses_left: Option<i64>,
    pub data: Vec<T>,
}

impl<T: Serialize> From<ContentBatch<T>> for ContentResponse<T> {
    fn from(batch: ContentBatch<T>) -> Self {
        ContentResponse {
            success: true,
            count: batch.items.len(),
            cached: batch.cached,
            uses_left: batch.uses_left,
            data: batch.items,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmbedRequest {
    #[validate(length(max = 100))]
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub model_dimensions: usize,
    pub embeddings: Vec<Vec<f32>>,
}
