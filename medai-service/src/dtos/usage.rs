use crate::models::QuotaKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    #[serde(default = "default_kind")]
    pub kind: QuotaKind,
}

fn default_kind() -> QuotaKind {
    QuotaKind::General
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub kind: QuotaKind,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub expand_distractors: bool,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub expand_distractors: bool,
}
