//! Request/result shapes for a single AI-orchestrated call.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Selects the system instruction template for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    FlashcardCreator,
    MedaiTutor,
    ExamMentor,
    TitleGenerator,
    SyllabusGenerator,
    SummaryGenerator,
    QuestionGenerator,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::FlashcardCreator => "flashcard_creator",
            ContextKey::MedaiTutor => "medai_tutor",
            ContextKey::ExamMentor => "exam_mentor",
            ContextKey::TitleGenerator => "title_generator",
            ContextKey::SyllabusGenerator => "syllabus_generator",
            ContextKey::SummaryGenerator => "summary_generator",
            ContextKey::QuestionGenerator => "question_generator",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Text,
    Json,
}

/// Input to [`crate::services::AiOrchestrator::ask_ai`]. Built per call, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    pub context_key: ContextKey,

    #[validate(length(min = 1, max = 20000))]
    pub user_message: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub history: Vec<ChatTurn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 20000))]
    pub system_instruction_args: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(default)]
    pub response_type: ResponseType,

    /// Set by composite operations that already consumed quota themselves.
    #[serde(skip)]
    pub skip_quota: bool,
}

impl GenerationRequest {
    pub fn new(context_key: ContextKey, user_message: impl Into<String>) -> Self {
        Self {
            context_key,
            user_message: user_message.into(),
            history: Vec::new(),
            system_instruction_args: None,
            model_name: None,
            response_type: ResponseType::Text,
            skip_quota: false,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_instruction_args(mut self, args: impl Into<String>) -> Self {
        self.system_instruction_args = Some(args.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.response_type = ResponseType::Json;
        self
    }

    pub fn without_quota(mut self) -> Self {
        self.skip_quota = true;
        self
    }
}

/// Uniform outcome of an AI call. Failures are values, never panics or raw errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,

    pub message: String,

    #[serde(default)]
    pub limit_reached: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses_left: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Parsed payload for `ResponseType::Json` requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl GenerationResult {
    pub fn ok(message: String, uses_left: Option<i64>) -> Self {
        Self {
            success: true,
            message,
            limit_reached: false,
            uses_left,
            error: None,
            data: None,
        }
    }

    pub fn limit_reached() -> Self {
        Self {
            success: false,
            message: "Daily limit reached.".to_string(),
            limit_reached: true,
            uses_left: Some(0),
            error: None,
            data: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: String::new(),
            limit_reached: false,
            uses_left: None,
            error: Some(error.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
