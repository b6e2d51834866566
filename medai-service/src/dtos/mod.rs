pub mod content;
pub mod usage;

pub use content::{
    ContentResponse, EmbedRequest, EmbedResponse, GenerateFlashcardsRequest,
    GenerateQuestionsRequest,
};
pub use usage::{PreferencesResponse, UpdatePreferencesRequest, UsageQuery, UsageResponse};
