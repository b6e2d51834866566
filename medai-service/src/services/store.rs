//! Persistence seam shared by the quota and content services.

use crate::models::{QuotaKind, StoredContent, UsageRecord, UserProfile};
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Storage operations the service needs. Implemented by MongoDB in production
/// and by [`MemoryStore`] in tests and local runs.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
    ) -> Result<Option<UsageRecord>, AppError>;

    /// Atomically increment the counter when it is below `limit`, creating it
    /// at 1 when absent. Returns `None` once the ceiling is reached.
    async fn increment_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
        limit: i64,
    ) -> Result<Option<UsageRecord>, AppError>;

    /// Give back one use taken by [`DataStore::increment_usage`]. Never drops
    /// the counter below zero.
    async fn refund_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
    ) -> Result<(), AppError>;

    async fn get_content(&self, identity_key: &str) -> Result<Option<StoredContent>, AppError>;

    async fn put_content(&self, content: &StoredContent) -> Result<(), AppError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

type UsageKey = (String, QuotaKind, String);

/// In-process store. The check and the increment happen under one lock, which
/// gives the same guarantee as the conditional update in MongoDB.
#[derive(Default)]
pub struct MemoryStore {
    usage: Mutex<HashMap<UsageKey, UsageRecord>>,
    content: Mutex<HashMap<String, StoredContent>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_count(&self) -> usize {
        self.content.lock().map(|c| c.len()).unwrap_or(0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Lock poisoned: {}", e)))
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
    ) -> Result<Option<UsageRecord>, AppError> {
        let usage = lock(&self.usage)?;
        Ok(usage
            .get(&(user_id.to_string(), kind, period.to_string()))
            .cloned())
    }

    async fn increment_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
        limit: i64,
    ) -> Result<Option<UsageRecord>, AppError> {
        let mut usage = lock(&self.usage)?;
        let key = (user_id.to_string(), kind, period.to_string());

        let used = usage.get(&key).map(|r| r.count).unwrap_or(0);
        if used >= limit {
            return Ok(None);
        }

        let record = usage
            .entry(key)
            .or_insert_with(|| UsageRecord::new(user_id, kind, period, limit));
        record.count += 1;
        record.limit = limit;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn refund_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
    ) -> Result<(), AppError> {
        let mut usage = lock(&self.usage)?;
        if let Some(record) = usage.get_mut(&(user_id.to_string(), kind, period.to_string())) {
            if record.count > 0 {
                record.count -= 1;
                record.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn get_content(&self, identity_key: &str) -> Result<Option<StoredContent>, AppError> {
        Ok(lock(&self.content)?.get(identity_key).cloned())
    }

    async fn put_content(&self, content: &StoredContent) -> Result<(), AppError> {
        lock(&self.content)?.insert(content.identity_key.clone(), content.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(lock(&self.profiles)?.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        lock(&self.profiles)?.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
