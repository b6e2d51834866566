use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    ContentResponse, EmbedRequest, EmbedResponse, GenerateFlashcardsRequest,
    GenerateQuestionsRequest,
};
use crate::middleware::AuthUser;
use crate::models::GenerationRequest;
use crate::services::{FlashcardParams, QuestionParams};
use crate::startup::AppState;

pub async fn generate_questions(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let params = QuestionParams::from(payload);
    let batch = state
        .content
        .get_or_generate_questions(&user.user_id, &params)
        .await?;

    Ok(Json(ContentResponse::from(batch)))
}

pub async fn generate_flashcards(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateFlashcardsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let params = FlashcardParams::from(payload);
    let batch = state
        .content
        .get_or_generate_flashcards(&user.user_id, &params)
        .await?;

    Ok(Json(ContentResponse::from(batch)))
}

/// Failures come back as a 200 with `success: false`; clients branch on the body.
pub async fn ask(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let result = state.orchestrator.ask_ai(&user.user_id, payload).await;
    Ok(Json(result))
}

pub async fn embed(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<EmbedRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let embeddings = state
        .orchestrator
        .embed_batch(&payload.texts)
        .await
        .map_err(|e| {
            tracing::warn!(user_id = %user.user_id, error = %e, "Embedding batch failed");
            AppError::BadGateway(e.user_message().to_string())
        })?;

    Ok(Json(EmbedResponse {
        model_dimensions: state.orchestrator.embedding_dimensions(),
        embeddings,
    }))
}
