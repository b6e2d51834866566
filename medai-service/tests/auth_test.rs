mod common;

use common::{token_with, user_token, TestApp, TEST_JWT_SECRET};
use serde_json::json;

fn question_body() -> serde_json::Value {
    json!({ "node_id": "node-1", "topic": "Cardiology" })
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/generate-questions"))
        .json(&question_body())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 401);
    assert_eq!(app.provider.chat_calls(), 0);
}

#[tokio::test]
async fn malformed_authorization_header_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/generate-questions"))
        .header("Authorization", "Token abc")
        .json(&question_body())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/medai/ask"))
        .bearer_auth(token_with("user-123", "some-other-secret", 3600))
        .json(&json!({ "context_key": "medai_tutor", "user_message": "hi" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 401);
    assert_eq!(app.provider.chat_calls(), 0);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/usage"))
        .bearer_auth(token_with("user-123", TEST_JWT_SECRET, -3600))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn valid_token_reaches_protected_routes() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/usage"))
        .bearer_auth(user_token("user-123"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn health_endpoints_do_not_require_auth() {
    let app = TestApp::spawn().await;

    for path in ["/health", "/ready", "/metrics"] {
        let response = app
            .client
            .get(app.url(path))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 200, "{} should be public", path);
    }
}
