//! Per-user usage ceilings.
//!
//! Every consume is a single conditional increment in the store, so concurrent
//! requests for the same user can never push a counter past its limit. Any
//! storage failure denies the call.

use super::metrics;
use super::store::DataStore;
use crate::config::QuotaConfig;
use crate::models::{Plan, QuotaKind, QuotaWindow};
use chrono::{DateTime, Datelike, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;

/// Outcome of a consume attempt. Carries the counter it touched so a failed
/// call can hand the use back to the same period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub uses_left: i64,
    pub limit: i64,
    pub kind: QuotaKind,
    pub period: String,
}

#[derive(Clone)]
pub struct QuotaService {
    store: Arc<dyn DataStore>,
    config: QuotaConfig,
}

impl QuotaService {
    pub fn new(store: Arc<dyn DataStore>, config: QuotaConfig) -> Self {
        Self { store, config }
    }

    /// Period key for `kind` at `now`, computed in the reference timezone.
    pub fn period_key(&self, kind: QuotaKind, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.config.timezone).date_naive();
        match kind.window() {
            QuotaWindow::Daily => local.format("%Y-%m-%d").to_string(),
            QuotaWindow::Weekly => {
                let week = local.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
        }
    }

    pub async fn limit_for(&self, user_id: &str, kind: QuotaKind) -> Result<i64, AppError> {
        let plan = self
            .store
            .get_profile(user_id)
            .await?
            .map(|p| p.plan)
            .unwrap_or(Plan::Free);
        Ok(self.config.limit(plan, kind))
    }

    pub async fn check_and_consume(
        &self,
        user_id: &str,
        kind: QuotaKind,
    ) -> Result<QuotaDecision, AppError> {
        self.check_and_consume_at(user_id, kind, Utc::now()).await
    }

    #[instrument(skip(self, now), fields(kind = %kind))]
    pub async fn check_and_consume_at(
        &self,
        user_id: &str,
        kind: QuotaKind,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError> {
        let limit = self.limit_for(user_id, kind).await?;
        let period = self.period_key(kind, now);

        let decision = match self
            .store
            .increment_usage(user_id, kind, &period, limit)
            .await?
        {
            Some(record) => QuotaDecision {
                allowed: true,
                uses_left: record.uses_left(),
                limit,
                kind,
                period: period.clone(),
            },
            None => QuotaDecision {
                allowed: false,
                uses_left: 0,
                limit,
                kind,
                period: period.clone(),
            },
        };

        metrics::record_quota_decision(kind, decision.allowed);
        tracing::debug!(
            user_id,
            kind = %kind,
            period = %period,
            allowed = decision.allowed,
            uses_left = decision.uses_left,
            "Quota consume"
        );

        Ok(decision)
    }

    /// Hand back the use taken by `decision` after the call it paid for failed.
    /// Denied decisions took nothing. Storage errors are logged, not returned,
    /// since the caller is already reporting a failure.
    pub async fn refund(&self, user_id: &str, decision: &QuotaDecision) {
        if !decision.allowed {
            return;
        }

        match self
            .store
            .refund_usage(user_id, decision.kind, &decision.period)
            .await
        {
            Ok(()) => {
                metrics::record_quota_refund(decision.kind);
                tracing::debug!(
                    user_id,
                    kind = %decision.kind,
                    period = %decision.period,
                    "Quota use refunded"
                );
            }
            Err(e) => {
                tracing::error!(user_id, kind = %decision.kind, error = %e, "Quota refund failed");
            }
        }
    }

    pub async fn remaining(&self, user_id: &str, kind: QuotaKind) -> Result<i64, AppError> {
        self.remaining_at(user_id, kind, Utc::now()).await
    }

    pub async fn remaining_at(
        &self,
        user_id: &str,
        kind: QuotaKind,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let limit = self.limit_for(user_id, kind).await?;
        let used = self
            .store
            .get_usage(user_id, kind, &self.period_key(kind, now))
            .await?
            .map(|r| r.count)
            .unwrap_or(0);
        Ok((limit - used).max(0))
    }
}
