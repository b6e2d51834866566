use chrono::{TimeZone, Utc};
use medai_service::config::{PlanLimits, QuotaConfig};
use medai_service::models::{Plan, QuotaKind, UserProfile};
use medai_service::services::{DataStore, MemoryStore, QuotaService};
use std::sync::Arc;

fn service(limits: PlanLimits) -> (QuotaService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = QuotaConfig {
        free: limits,
        ..QuotaConfig::default()
    };
    (QuotaService::new(store.clone(), config), store)
}

#[tokio::test]
async fn concurrent_consumers_never_exceed_the_limit() {
    let (quota, _) = service(PlanLimits {
        general: 5,
        ..PlanLimits::FREE
    });

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let quota = quota.clone();
            tokio::spawn(async move { quota.check_and_consume("racer", QuotaKind::General).await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        let decision = handle
            .await
            .expect("task panicked")
            .expect("quota check failed");
        if decision.allowed {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 5);
    assert_eq!(
        quota.remaining("racer", QuotaKind::General).await.expect("remaining"),
        0
    );
}

#[tokio::test]
async fn kinds_are_counted_independently() {
    let (quota, _) = service(PlanLimits::FREE);

    let flashcard = quota
        .check_and_consume("u1", QuotaKind::Flashcard)
        .await
        .expect("consume");
    assert!(flashcard.allowed);

    let denied = quota
        .check_and_consume("u1", QuotaKind::Flashcard)
        .await
        .expect("consume");
    assert!(!denied.allowed);

    let general = quota
        .check_and_consume("u1", QuotaKind::General)
        .await
        .expect("consume");
    assert!(general.allowed);
    assert_eq!(general.uses_left, PlanLimits::FREE.general - 1);
}

#[tokio::test]
async fn users_are_counted_independently() {
    let (quota, _) = service(PlanLimits {
        general: 1,
        ..PlanLimits::FREE
    });

    assert!(quota.check_and_consume("a", QuotaKind::General).await.expect("a").allowed);
    assert!(!quota.check_and_consume("a", QuotaKind::General).await.expect("a").allowed);
    assert!(quota.check_and_consume("b", QuotaKind::General).await.expect("b").allowed);
}

#[tokio::test]
async fn premium_profile_gets_premium_limits() {
    let (quota, store) = service(PlanLimits::FREE);

    let mut profile = UserProfile::new("vip");
    profile.plan = Plan::Premium;
    store.upsert_profile(&profile).await.expect("upsert");

    assert_eq!(
        quota.remaining("vip", QuotaKind::Question).await.expect("remaining"),
        PlanLimits::PREMIUM.question
    );
}

#[tokio::test]
async fn summary_quota_spans_the_iso_week() {
    let (quota, _) = service(PlanLimits {
        summary: 2,
        ..PlanLimits::FREE
    });

    // Monday and Saturday of the same ISO week, local time.
    let monday = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
    let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 15, 0, 0).unwrap();
    let next_monday = Utc.with_ymd_and_hms(2026, 3, 9, 15, 0, 0).unwrap();

    assert!(quota.check_and_consume_at("u", QuotaKind::Summary, monday).await.expect("consume").allowed);
    assert!(quota.check_and_consume_at("u", QuotaKind::Summary, saturday).await.expect("consume").allowed);
    assert!(!quota.check_and_consume_at("u", QuotaKind::Summary, saturday).await.expect("consume").allowed);
    assert!(quota.check_and_consume_at("u", QuotaKind::Summary, next_monday).await.expect("consume").allowed);
}
