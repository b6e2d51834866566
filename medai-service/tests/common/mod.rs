//! Test helper module for medai-service integration tests.
//!
//! Spawns the HTTP server on a random port over the in-memory store and the
//! scriptable mock provider.

#![allow(dead_code)]

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use medai_service::config::{
    AuthConfig, GoogleConfig, MedaiConfig, ModelConfig, PlanLimits, ProviderConfig, ProviderKind,
    QuotaConfig, StoreConfig, StoreKind,
};
use medai_service::middleware::Claims;
use medai_service::services::metrics::init_metrics;
use medai_service::services::providers::mock::MockProvider;
use medai_service::services::MemoryStore;
use medai_service::startup::{AppState, Application};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_JWT_SECRET: &str = "test-secret-for-medai-integration";
pub const TEST_AUDIENCE: &str = "authenticated";
pub const TEST_USER_ID: &str = "user-123";
pub const EMBEDDING_DIMENSIONS: usize = 8;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
    pub client: reqwest::Client,
}

pub fn test_config(limits: PlanLimits) -> MedaiConfig {
    MedaiConfig {
        common: CoreConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        store: StoreConfig {
            kind: StoreKind::Memory,
            mongodb_uri: String::new(),
            mongodb_database: "medai_test".to_string(),
        },
        google: GoogleConfig {
            api_key: String::new(),
            base_url: String::new(),
        },
        models: ModelConfig {
            chat_model: "chat-model".to_string(),
            question_model: "question-model".to_string(),
            flashcard_model: "flashcard-model".to_string(),
            embedding_model: "embedding-model".to_string(),
            embedding_dimensions: EMBEDDING_DIMENSIONS,
        },
        provider: ProviderConfig {
            kind: ProviderKind::Mock,
            timeout: Duration::from_secs(5),
            max_retries: 0,
        },
        quota: QuotaConfig {
            timezone: chrono_tz::America::Sao_Paulo,
            free: limits,
            premium: PlanLimits::PREMIUM,
        },
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            audience: Some(TEST_AUDIENCE.to_string()),
        },
        otlp_endpoint: None,
    }
}

impl TestApp {
    /// Spawn with the default free-plan ceilings.
    pub async fn spawn() -> Self {
        Self::spawn_with(PlanLimits::FREE, MockProvider::new()).await
    }

    pub async fn spawn_with(limits: PlanLimits, provider: MockProvider) -> Self {
        init_metrics().expect("Failed to initialize metrics");

        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let state = AppState::new(test_config(limits), store.clone(), provider.clone());

        let app = Application::with_state(state)
            .await
            .expect("Failed to build application");
        let port = app.port();

        tokio::spawn(async move {
            let _ = app.run_until_stopped().await;
        });

        Self {
            address: format!("http://127.0.0.1:{}", port),
            port,
            store,
            provider,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(user_token(TEST_USER_ID))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_authed(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(user_token(TEST_USER_ID))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn remaining(&self, kind: &str) -> i64 {
        let body: serde_json::Value = self
            .get_authed(&format!("/api/usage?kind={}", kind))
            .await
            .json()
            .await
            .expect("Failed to parse usage body");
        body["remaining"].as_i64().expect("remaining is not a number")
    }
}

pub fn token_with(sub: &str, secret: &str, exp_offset_secs: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (Utc::now().timestamp() + exp_offset_secs) as usize,
        aud: Some(TEST_AUDIENCE.to_string()),
        email: Some(format!("{}@example.com", sub)),
        role: Some("authenticated".to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign token")
}

pub fn user_token(sub: &str) -> String {
    token_with(sub, TEST_JWT_SECRET, 3600)
}

pub fn mcq(statement: &str) -> serde_json::Value {
    serde_json::json!({
        "statement": statement,
        "q_type": "multiple_choice",
        "difficulty": "medium",
        "commentary": "The first option is correct because it matches the classic presentation; the others describe unrelated conditions.",
        "content": {
            "options": [
                { "id": "a", "text": "Inferior wall myocardial infarction", "isCorrect": true },
                { "id": "b", "text": "Acute pericarditis with effusion", "isCorrect": false },
                { "id": "c", "text": "Pulmonary embolism with right strain", "isCorrect": false },
                { "id": "d", "text": "Aortic dissection involving the arch", "isCorrect": false }
            ]
        }
    })
}

/// A JSON reply carrying `count` valid multiple-choice questions.
pub fn questions_reply(count: usize) -> String {
    let items: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            mcq(&format!(
                "Case {}: a 58-year-old man presents with chest pain and ST elevation in II, III and aVF. What is the most likely diagnosis?",
                i + 1
            ))
        })
        .collect();
    serde_json::json!({ "questions": items }).to_string()
}

pub fn flashcards_reply() -> String {
    serde_json::json!({
        "cards": [
            {
                "front": "What is the first-line treatment for anaphylaxis?",
                "back": "Intramuscular epinephrine 0.5 mg in the anterolateral thigh, repeated every 5 minutes if needed."
            },
            {
                "front": "Which electrolyte disturbance causes peaked T waves?",
                "back": "Hyperkalemia; peaked T waves are the earliest ECG sign and precede QRS widening."
            },
            {
                "front": "What is the first-line treatment of anaphylaxis?",
                "back": "Epinephrine given intramuscularly, 0.5 mg, repeated every five minutes as required."
            }
        ]
    })
    .to_string()
}
