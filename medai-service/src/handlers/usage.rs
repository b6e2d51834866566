use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::{PreferencesResponse, UpdatePreferencesRequest, UsageQuery, UsageResponse};
use crate::middleware::AuthUser;
use crate::models::UserProfile;
use crate::startup::AppState;

pub async fn get_usage(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UsageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.quota.limit_for(&user.user_id, query.kind).await?;
    let remaining = state.quota.remaining(&user.user_id, query.kind).await?;

    Ok(Json(UsageResponse {
        kind: query.kind,
        limit,
        remaining,
    }))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut profile = state
        .store
        .get_profile(&user.user_id)
        .await?
        .unwrap_or_else(|| UserProfile::new(&user.user_id));

    profile.expand_distractors = payload.expand_distractors;
    profile.updated_at = Utc::now();
    state.store.upsert_profile(&profile).await?;

    tracing::info!(user_id = %user.user_id, expand_distractors = profile.expand_distractors, "Updated preferences");
    Ok(Json(PreferencesResponse {
        expand_distractors: profile.expand_distractors,
    }))
}
