//! Prometheus metrics for medai-service.
//!
//! Recording helpers are no-ops until [`init_metrics`] has run, so library code
//! and tests never need a registry.

use crate::models::QuotaKind;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

static INIT_LOCK: Mutex<()> = Mutex::new(());

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// AI-specific metrics
pub static AI_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static AI_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static AI_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Quota and content metrics
pub static QUOTA_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CONTENT_CACHE_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let http_requests = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let http_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["method", "path"],
    )?;

    // outcome: success, limit_reached, error
    let ai_requests = IntCounterVec::new(
        Opts::new("medai_ai_requests_total", "Total orchestrated AI requests"),
        &["context", "outcome"],
    )?;

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "medai_provider_latency_seconds",
            "AI provider API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider", "operation"],
    )?;

    let provider_errors = IntCounterVec::new(
        Opts::new("medai_provider_errors_total", "Total AI provider errors"),
        &["provider", "error_type"],
    )?;

    let quota_decisions = IntCounterVec::new(
        Opts::new("medai_quota_decisions_total", "Quota consume decisions"),
        &["kind", "decision"],
    )?;

    let content_cache = IntCounterVec::new(
        Opts::new("medai_content_cache_total", "Generated content cache lookups"),
        &["content", "result"],
    )?;

    registry.register(Box::new(http_requests.clone()))?;
    registry.register(Box::new(http_duration.clone()))?;
    registry.register(Box::new(ai_requests.clone()))?;
    registry.register(Box::new(provider_latency.clone()))?;
    registry.register(Box::new(provider_errors.clone()))?;
    registry.register(Box::new(quota_decisions.clone()))?;
    registry.register(Box::new(content_cache.clone()))?;

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_duration);
    let _ = AI_REQUESTS_TOTAL.set(ai_requests);
    let _ = AI_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = AI_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = QUOTA_DECISIONS_TOTAL.set(quota_decisions);
    let _ = CONTENT_CACHE_TOTAL.set(content_cache);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => return "# Metrics registry not initialized\n".to_string(),
    };

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(elapsed.as_secs_f64());
    }
}

pub fn record_ai_request(context: &str, outcome: &str) {
    if let Some(counter) = AI_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[context, outcome]).inc();
    }
}

pub fn record_provider_latency(provider: &str, operation: &str, elapsed: Duration) {
    if let Some(histogram) = AI_PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, operation])
            .observe(elapsed.as_secs_f64());
    }
}

pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = AI_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

pub fn record_quota_decision(kind: QuotaKind, allowed: bool) {
    if let Some(counter) = QUOTA_DECISIONS_TOTAL.get() {
        let decision = if allowed { "allowed" } else { "denied" };
        counter.with_label_values(&[kind.as_str(), decision]).inc();
    }
}

pub fn record_quota_refund(kind: QuotaKind) {
    if let Some(counter) = QUOTA_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[kind.as_str(), "refunded"]).inc();
    }
}

pub fn record_cache_lookup(content: &str, hit: bool) {
    if let Some(counter) = CONTENT_CACHE_TOTAL.get() {
        let result = if hit { "hit" } else { "miss" };
        counter.with_label_values(&[content, result]).inc();
    }
}
