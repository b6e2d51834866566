use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::services::metrics;
use crate::startup::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "medai-service" }))
}

/// Ready when the store answers; the provider is reported but not required.
pub async fn readiness(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::ServiceUnavailable
    })?;

    let provider = match state.provider.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("degraded: {}", e.kind()),
    };

    Ok(Json(json!({ "status": "ready", "store": "ok", "provider": provider })))
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::get_metrics(),
    )
}
