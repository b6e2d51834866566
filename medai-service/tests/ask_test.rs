mod common;

use common::{TestApp, EMBEDDING_DIMENSIONS};
use medai_service::config::PlanLimits;
use medai_service::services::providers::mock::MockProvider;
use medai_service::services::providers::ProviderError;
use serde_json::json;

fn limits(general: i64) -> PlanLimits {
    PlanLimits {
        general,
        ..PlanLimits::FREE
    }
}

fn ask_body(message: &str) -> serde_json::Value {
    json!({ "context_key": "medai_tutor", "user_message": message })
}

#[tokio::test]
async fn ask_returns_reply_and_counts_down_usage() {
    let app = TestApp::spawn_with(
        limits(3),
        MockProvider::new().with_default_reply("Beta blockers reduce mortality after MI."),
    )
    .await;

    assert_eq!(app.remaining("general").await, 3);

    let response = app.post_json("/api/medai/ask", &ask_body("Why beta blockers?")).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Beta blockers reduce mortality after MI.");
    assert_eq!(body["uses_left"], 2);
    assert_eq!(body["limit_reached"], false);

    assert_eq!(app.remaining("general").await, 2);

    let request = app.provider.last_request().expect("provider was not called");
    assert_eq!(request.model, "chat-model");
    assert_eq!(request.message, "Why beta blockers?");
    assert!(!request.json_output);
}

#[tokio::test]
async fn ask_stops_at_the_daily_limit() {
    let app = TestApp::spawn_with(limits(2), MockProvider::new()).await;

    for expected_left in [1, 0] {
        let body: serde_json::Value = app
            .post_json("/api/medai/ask", &ask_body("question"))
            .await
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["success"], true);
        assert_eq!(body["uses_left"], expected_left);
    }

    let response = app.post_json("/api/medai/ask", &ask_body("one more")).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], false);
    assert_eq!(body["limit_reached"], true);
    assert_eq!(body["uses_left"], 0);
    assert_eq!(body["message"], "Daily limit reached.");

    assert_eq!(app.provider.chat_calls(), 2);
    assert_eq!(app.remaining("general").await, 0);
}

#[tokio::test]
async fn ask_with_zero_limit_never_calls_provider() {
    let app = TestApp::spawn_with(limits(0), MockProvider::new()).await;

    let body: serde_json::Value = app
        .post_json("/api/medai/ask", &ask_body("hello"))
        .await
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(body["limit_reached"], true);
    assert_eq!(app.provider.chat_calls(), 0);
}

#[tokio::test]
async fn provider_failure_is_reported_in_body_and_refunded() {
    let app = TestApp::spawn_with(limits(5), MockProvider::new()).await;
    app.provider.push_reply(Err(ProviderError::RateLimited));

    let response = app.post_json("/api/medai/ask", &ask_body("hello")).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], false);
    assert_eq!(body["limit_reached"], false);
    assert!(body["error"].is_string());
    assert_eq!(body["uses_left"], 5);

    assert_eq!(app.remaining("general").await, 5);
}

#[tokio::test]
async fn configured_model_override_is_accepted() {
    let app = TestApp::spawn().await;

    let body: serde_json::Value = app
        .post_json(
            "/api/medai/ask",
            &json!({
                "context_key": "exam_mentor",
                "user_message": "Explain the Frank-Starling law",
                "model_name": "question-model"
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(body["success"], true);
    let request = app.provider.last_request().expect("provider was not called");
    assert_eq!(request.model, "question-model");
}

#[tokio::test]
async fn unknown_model_is_rejected_before_any_call() {
    let app = TestApp::spawn().await;

    for model in ["gemini-ultra-private", "chat-model:streamGenerateContent?alt=sse#"] {
        let response = app
            .post_json(
                "/api/medai/ask",
                &json!({
                    "context_key": "medai_tutor",
                    "user_message": "hello",
                    "model_name": model
                }),
            )
            .await;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unsupported model.");
    }

    assert_eq!(app.provider.chat_calls(), 0);
    assert_eq!(app.remaining("general").await, PlanLimits::FREE.general);
}

#[tokio::test]
async fn json_response_type_returns_parsed_data() {
    let app = TestApp::spawn_with(limits(5), MockProvider::new()).await;
    app.provider
        .push_reply(Ok("```json\n{\"title\": \"Heart failure\"}\n```".to_string()));

    let body: serde_json::Value = app
        .post_json(
            "/api/medai/ask",
            &json!({
                "context_key": "title_generator",
                "user_message": "Name this chat",
                "response_type": "json"
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["title"], "Heart failure");
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/api/medai/ask", &ask_body("")).await;

    assert_eq!(response.status(), 422);
    assert_eq!(app.provider.chat_calls(), 0);
}

#[tokio::test]
async fn embeddings_return_one_vector_per_text() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/embeddings",
            &json!({ "texts": ["aortic stenosis", "mitral regurgitation"] }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["model_dimensions"], EMBEDDING_DIMENSIONS);

    let embeddings = body["embeddings"].as_array().expect("embeddings array");
    assert_eq!(embeddings.len(), 2);
    for vector in embeddings {
        assert_eq!(vector.as_array().map(|v| v.len()), Some(EMBEDDING_DIMENSIONS));
    }
    assert_eq!(app.remaining("general").await, PlanLimits::FREE.general);
}

#[tokio::test]
async fn embeddings_fail_whole_batch_when_one_text_fails() {
    let app = TestApp::spawn().await;
    app.provider.fail_embedding_for("broken");

    let response = app
        .post_json("/api/embeddings", &json!({ "texts": ["fine", "broken"] }))
        .await;

    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn empty_embedding_batch_returns_empty_list() {
    let app = TestApp::spawn().await;

    let body: serde_json::Value = app
        .post_json("/api/embeddings", &json!({ "texts": [] }))
        .await
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(body["embeddings"], json!([]));
    assert_eq!(app.provider.embed_calls(), 0);
}
