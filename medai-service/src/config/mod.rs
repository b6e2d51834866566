use crate::models::{Plan, QuotaKind};
use chrono_tz::Tz;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

#[derive(Debug, Clone)]
pub struct MedaiConfig {
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub provider: ProviderConfig,
    pub quota: QuotaConfig,
    pub auth: AuthConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Default model for chat-style calls
    pub chat_model: String,
    pub question_model: String,
    pub flashcard_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
}

impl ModelConfig {
    /// Chat models a generation request is allowed to name.
    pub fn generation_models(&self) -> Vec<String> {
        let mut models = vec![
            self.chat_model.clone(),
            self.question_model.clone(),
            self.flashcard_model.clone(),
        ];
        models.sort();
        models.dedup();
        models
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Upper bound for one provider call, retries included
    pub timeout: Duration,
    /// Extra attempts for transient failures; zero disables retrying
    pub max_retries: u32,
}

/// Per-kind ceilings for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub general: i64,
    pub flashcard: i64,
    pub question: i64,
    pub clinical: i64,
    pub summary: i64,
}

impl PlanLimits {
    pub fn for_kind(&self, kind: QuotaKind) -> i64 {
        match kind {
            QuotaKind::General => self.general,
            QuotaKind::Flashcard => self.flashcard,
            QuotaKind::Question => self.question,
            QuotaKind::Clinical => self.clinical,
            QuotaKind::Summary => self.summary,
        }
    }

    pub const FREE: PlanLimits = PlanLimits {
        general: 5,
        flashcard: 1,
        question: 5,
        clinical: 3,
        summary: 10,
    };

    pub const PREMIUM: PlanLimits = PlanLimits {
        general: 50,
        flashcard: 10,
        question: 30,
        clinical: 20,
        summary: 50,
    };
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Reference timezone that decides when a day (or ISO week) rolls over
    pub timezone: Tz,
    pub free: PlanLimits,
    pub premium: PlanLimits,
}

impl QuotaConfig {
    pub fn limit(&self, plan: Plan, kind: QuotaKind) -> i64 {
        match plan {
            Plan::Free => self.free.for_kind(kind),
            Plan::Premium => self.premium.for_kind(kind),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Sao_Paulo,
            free: PlanLimits::FREE,
            premium: PlanLimits::PREMIUM,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    pub audience: Option<String>,
}

impl MedaiConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let store_kind = match get_or("MEDAI_STORE", "mongodb").as_str() {
            "memory" => StoreKind::Memory,
            "mongodb" => StoreKind::Mongo,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MEDAI_STORE must be 'mongodb' or 'memory', got '{}'",
                    other
                )))
            }
        };
        let provider_kind = match get_or("MEDAI_PROVIDER", "gemini").as_str() {
            "mock" => ProviderKind::Mock,
            "gemini" => ProviderKind::Gemini,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MEDAI_PROVIDER must be 'gemini' or 'mock', got '{}'",
                    other
                )))
            }
        };

        let mongodb_uri = match store_kind {
            StoreKind::Mongo => get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
            StoreKind::Memory => String::new(),
        };
        let api_key = match provider_kind {
            ProviderKind::Gemini => env::var("GEMINI_API_KEY")
                .or_else(|_| get_env("GOOGLE_API_KEY", None, is_prod))?,
            ProviderKind::Mock => String::new(),
        };

        let chat_model = get_or("MEDAI_CHAT_MODEL", DEFAULT_CHAT_MODEL);
        let timezone_name = get_or("MEDAI_QUOTA_TIMEZONE", DEFAULT_TIMEZONE);
        let timezone = Tz::from_str(&timezone_name).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("MEDAI_QUOTA_TIMEZONE: {}", e))
        })?;

        Ok(MedaiConfig {
            common: common_config,
            store: StoreConfig {
                kind: store_kind,
                mongodb_uri,
                mongodb_database: get_or("MONGODB_DATABASE", "medai_db"),
            },
            google: GoogleConfig {
                api_key,
                base_url: get_or(
                    "GEMINI_API_BASE",
                    crate::services::providers::gemini::GEMINI_API_BASE,
                ),
            },
            models: ModelConfig {
                question_model: get_or("MEDAI_QUESTION_MODEL", &chat_model),
                flashcard_model: get_or("MEDAI_FLASHCARD_MODEL", &chat_model),
                chat_model,
                embedding_model: get_or("MEDAI_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
                embedding_dimensions: parse_env(
                    "MEDAI_EMBEDDING_DIMENSIONS",
                    DEFAULT_EMBEDDING_DIMENSIONS,
                )?,
            },
            provider: ProviderConfig {
                kind: provider_kind,
                timeout: Duration::from_secs(parse_env(
                    "MEDAI_PROVIDER_TIMEOUT_SECS",
                    DEFAULT_PROVIDER_TIMEOUT_SECS,
                )?),
                max_retries: parse_env("MEDAI_PROVIDER_MAX_RETRIES", 0)?,
            },
            quota: QuotaConfig {
                timezone,
                free: load_plan_limits("FREE", PlanLimits::FREE)?,
                premium: load_plan_limits("PREMIUM", PlanLimits::PREMIUM)?,
            },
            auth: AuthConfig {
                jwt_secret: get_env("AUTH_JWT_SECRET", None, is_prod)
                    .or_else(|_| get_env("SUPABASE_JWT_SECRET", None, is_prod))?,
                audience: env::var("AUTH_JWT_AUDIENCE")
                    .ok()
                    .or_else(|| Some("authenticated".to_string()))
                    .filter(|a| !a.is_empty()),
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
        })
    }
}

/// `QUOTA_<PLAN>_<KIND>` overrides, e.g. `QUOTA_FREE_GENERAL=10`.
fn load_plan_limits(plan: &str, defaults: PlanLimits) -> Result<PlanLimits, AppError> {
    let key = |kind: QuotaKind| format!("QUOTA_{}_{}", plan, kind.as_str().to_uppercase());
    Ok(PlanLimits {
        general: parse_env(&key(QuotaKind::General), defaults.general)?,
        flashcard: parse_env(&key(QuotaKind::Flashcard), defaults.flashcard)?,
        question: parse_env(&key(QuotaKind::Question), defaults.question)?,
        clinical: parse_env(&key(QuotaKind::Clinical), defaults.clinical)?,
        summary: parse_env(&key(QuotaKind::Summary), defaults.summary)?,
    })
}

fn get_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, val, e))
        }),
        Err(_) => Ok(default),
    }
}

/// Variables without a default are mandatory; in production even defaulted
/// infrastructure settings must be set explicitly.
fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
