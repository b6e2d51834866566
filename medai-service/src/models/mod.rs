pub mod content;
pub mod generation;
pub mod profile;
pub mod usage;

pub use content::{
    AnswerOption, Difficulty, Flashcard, FlashcardDifficulty, GeneratedContent, GenerationMode,
    Question, QuestionContent, QuestionType, StoredContent,
};
pub use generation::{
    ChatRole, ChatTurn, ContextKey, GenerationRequest, GenerationResult, ResponseType,
};
pub use profile::UserProfile;
pub use usage::{Plan, QuotaKind, QuotaWindow, UsageRecord};
