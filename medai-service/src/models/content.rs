//! Generated study content: questions, flashcards and their cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// XP granted for answering a question of this difficulty correctly.
    pub fn xp_reward(&self) -> u32 {
        match self {
            Difficulty::Hard => 20,
            _ => 10,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillGap,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::FillGap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillGap => "fill_gap",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Question set layout requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Standard,
    /// Ten-question challenge: five medium then five hard.
    Boss,
    /// Fast-paced multiple choice round.
    Kahoot,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Standard => "standard",
            GenerationMode::Boss => "boss",
            GenerationMode::Kahoot => "kahoot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

/// Type-specific body of a question. Which fields are required depends on
/// [`QuestionType`] and is enforced by the question validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionContent {
    #[serde(default)]
    pub options: Vec<AnswerOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub statement: String,
    pub q_type: QuestionType,
    pub difficulty: Difficulty,
    pub commentary: String,
    pub content: QuestionContent,
    #[serde(default)]
    pub xp_reward: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashcardDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Mixed,
}

impl FlashcardDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashcardDifficulty::Easy => "easy",
            FlashcardDifficulty::Medium => "medium",
            FlashcardDifficulty::Hard => "hard",
            FlashcardDifficulty::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "snake_case")]
pub enum GeneratedContent {
    Questions(Vec<Question>),
    Flashcards(Vec<Flashcard>),
}

impl GeneratedContent {
    pub fn len(&self) -> usize {
        match self {
            GeneratedContent::Questions(items) => items.len(),
            GeneratedContent::Flashcards(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A validated, persisted generation, looked up by its identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredContent {
    pub identity_key: String,

    pub topic: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    pub content: GeneratedContent,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_questions_are_worth_double_xp() {
        assert_eq!(Difficulty::Hard.xp_reward(), 20);
        assert_eq!(Difficulty::Medium.xp_reward(), 10);
        assert_eq!(Difficulty::Easy.xp_reward(), 10);
    }

    #[test]
    fn question_parses_from_provider_shape() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "statement": "Which nerve innervates the diaphragm?",
            "q_type": "multiple_choice",
            "difficulty": "medium",
            "commentary": "The phrenic nerve (C3-C5) keeps the diaphragm alive.",
            "content": {
                "options": [
                    { "id": "a", "text": "Phrenic", "isCorrect": true },
                    { "id": "b", "text": "Vagus", "isCorrect": false }
                ]
            }
        }))
        .unwrap();

        assert_eq!(q.q_type, QuestionType::MultipleChoice);
        assert_eq!(q.content.options.len(), 2);
        assert!(q.content.correct_answer.is_none());
        assert_eq!(q.xp_reward, 0);
    }

    #[test]
    fn question_missing_statement_is_rejected() {
        let parsed = serde_json::from_value::<Question>(serde_json::json!({
            "q_type": "true_false",
            "difficulty": "easy",
            "commentary": "c",
            "content": {}
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn generated_content_is_tagged() {
        let content = GeneratedContent::Flashcards(vec![Flashcard {
            front: "f".into(),
            back: "b".into(),
            tags: vec![],
        }]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["type"], "flashcards");
        assert_eq!(value["items"][0]["front"], "f");
    }
}
