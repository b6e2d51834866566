pub mod content;
pub mod database;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod quota;
pub mod store;
pub mod validation;

pub use content::{ContentBatch, ContentError, ContentService, FlashcardParams, QuestionParams};
pub use database::MedaiDb;
pub use orchestrator::{AiOrchestrator, OrchestratorConfig};
pub use quota::{QuotaDecision, QuotaService};
pub use store::{DataStore, MemoryStore};
