use super::usage::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user settings read by the quota and content services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    #[serde(default)]
    pub plan: Plan,

    /// Ask the generator for longer, more plausible distractors.
    #[serde(default)]
    pub expand_distractors: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            plan: Plan::Free,
            expand_distractors: false,
            updated_at: Utc::now(),
        }
    }
}
