//! Application startup and lifecycle management.

use crate::config::{MedaiConfig, ProviderKind, StoreKind};
use crate::handlers;
use crate::middleware::{auth_middleware, track_http_metrics, JwtVerifier};
use crate::services::providers::gemini::{GeminiConfig, GeminiProvider};
use crate::services::providers::mock::MockProvider;
use crate::services::providers::AiProvider;
use crate::services::{
    metrics, AiOrchestrator, ContentService, DataStore, MedaiDb, MemoryStore, OrchestratorConfig,
    QuotaService,
};
use axum::{
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use service_core::retry::RetryConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MedaiConfig>,
    pub store: Arc<dyn DataStore>,
    pub provider: Arc<dyn AiProvider>,
    pub quota: QuotaService,
    pub orchestrator: AiOrchestrator,
    pub content: ContentService,
    pub jwt: JwtVerifier,
}

impl AppState {
    /// Wire services around an already-built store and provider.
    pub fn new(
        config: MedaiConfig,
        store: Arc<dyn DataStore>,
        provider: Arc<dyn AiProvider>,
    ) -> Self {
        let quota = QuotaService::new(store.clone(), config.quota.clone());

        let orchestrator = AiOrchestrator::new(
            provider.clone(),
            quota.clone(),
            OrchestratorConfig {
                default_model: config.models.chat_model.clone(),
                allowed_models: config.models.generation_models(),
                embedding_model: config.models.embedding_model.clone(),
                embedding_dimensions: config.models.embedding_dimensions,
                timeout: config.provider.timeout,
                retry: RetryConfig::with_max_retries(config.provider.max_retries),
            },
        );

        let content = ContentService::new(
            store.clone(),
            quota.clone(),
            orchestrator.clone(),
            config.models.question_model.clone(),
            config.models.flashcard_model.clone(),
        );

        let jwt = JwtVerifier::new(&config.auth.jwt_secret, config.auth.audience.as_deref());

        Self {
            config: Arc::new(config),
            store,
            provider,
            quota,
            orchestrator,
            content,
            jwt,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/generate-questions", post(handlers::generation::generate_questions))
        .route("/generate-flashcards", post(handlers::generation::generate_flashcards))
        .route("/medai/ask", post(handlers::generation::ask))
        .route("/embeddings", post(handlers::generation::embed))
        .route("/usage", get(handlers::usage::get_usage))
        .route("/profile/preferences", put(handlers::usage::update_preferences))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::health::metrics_endpoint))
        .nest("/api", api)
        .route_layer(from_fn(track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

async fn build_store(config: &MedaiConfig) -> Result<Arc<dyn DataStore>, AppError> {
    match config.store.kind {
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Mongo => {
            let db = MedaiDb::connect(&config.store.mongodb_uri, &config.store.mongodb_database)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;
            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(db))
        }
    }
}

fn build_provider(config: &MedaiConfig) -> Result<Arc<dyn AiProvider>, AppError> {
    match config.provider.kind {
        ProviderKind::Mock => {
            tracing::warn!("Using mock AI provider");
            Ok(Arc::new(MockProvider::new()))
        }
        ProviderKind::Gemini => {
            let provider = GeminiProvider::new(GeminiConfig {
                api_key: config.google.api_key.clone(),
                base_url: config.google.base_url.clone(),
                request_timeout: config.provider.timeout,
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

            tracing::info!(
                chat_model = %config.models.chat_model,
                embedding_model = %config.models.embedding_model,
                "Initialized Gemini provider"
            );
            Ok(Arc::new(provider))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: MedaiConfig) -> Result<Self, AppError> {
        metrics::init_metrics()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("metrics: {}", e)))?;

        let store = build_store(&config).await?;
        let provider = build_provider(&config)?;
        let state = AppState::new(config, store, provider);

        Self::with_state(state).await
    }

    /// Bind a listener for prebuilt state (port 0 = random port for testing).
    pub async fn with_state(state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("medai-service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
