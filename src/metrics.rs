// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the NextDNS webhook provider.
//!
//! All metrics carry the namespace prefix `nextdns_webhook_` and are exposed on the
//! health server's `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Rewrite Lifecycle Metrics** - rewrites created and deleted, overwrites blocked
//! - **API Metrics** - retries and classified errors per remote operation
//! - **Change Set Metrics** - outcome and duration of `POST /records` passes
//!
//! # Example
//!
//! ```rust,no_run
//! use nextdns_webhook::metrics::{gather_metrics, record_rewrite_created};
//!
//! record_rewrite_created("A");
//! let text = gather_metrics().unwrap();
//! assert!(text.contains("nextdns_webhook_rewrites_created_total"));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

use crate::errors::ErrorClass;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "nextdns_webhook";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

// ============================================================================
// Rewrite Lifecycle Metrics
// ============================================================================

/// Total number of rewrites created
///
/// Labels:
/// - `record_type`: requested record kind (`A`, `AAAA`, `CNAME`)
pub static REWRITES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "rewrites_created_total",
        "Total number of NextDNS rewrites created by record type",
        &["record_type"],
    )
});

/// Total number of rewrites deleted
///
/// Labels:
/// - `record_type`: record kind of the deleted rewrite
pub static REWRITES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "rewrites_deleted_total",
        "Total number of NextDNS rewrites deleted by record type",
        &["record_type"],
    )
});

/// Total number of creates skipped because an existing record was not authorized
/// for overwrite
pub static OVERWRITES_BLOCKED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "overwrites_blocked_total",
        "Total number of record overwrites blocked by the overwrite policy",
        &["record_type"],
    )
});

// ============================================================================
// API Metrics
// ============================================================================

/// Total number of retries scheduled by the retry policy
///
/// Labels:
/// - `operation`: remote operation (`ListRewrites`, `CreateRewrite`, `DeleteRewrite`)
pub static API_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "api_retries_total",
        "Total number of NextDNS API retries by operation",
        &["operation"],
    )
});

/// Total number of failed API attempts
///
/// Labels:
/// - `operation`: remote operation
/// - `class`: `transient`, `terminal` or `unclassified`
pub static API_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "api_errors_total",
        "Total number of failed NextDNS API attempts by operation and error class",
        &["operation", "class"],
    )
});

// ============================================================================
// Change Set Metrics
// ============================================================================

/// Total number of change sets applied
///
/// Labels:
/// - `status`: `success`, `error` or `dry_run`
pub static CHANGESETS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "changesets_total",
        "Total number of change sets processed by outcome",
        &["status"],
    )
});

/// Duration of change set processing in seconds
pub static CHANGESET_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_changeset_duration_seconds"),
        "Duration of change set processing in seconds by outcome",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a created rewrite
pub fn record_rewrite_created(record_type: &str) {
    REWRITES_CREATED_TOTAL
        .with_label_values(&[record_type])
        .inc();
}

/// Record a deleted rewrite
pub fn record_rewrite_deleted(record_type: &str) {
    REWRITES_DELETED_TOTAL
        .with_label_values(&[record_type])
        .inc();
}

/// Record an overwrite blocked by the overwrite policy
pub fn record_overwrite_blocked(record_type: &str) {
    OVERWRITES_BLOCKED_TOTAL
        .with_label_values(&[record_type])
        .inc();
}

/// Record a retry scheduled for `operation`
pub fn record_api_retry(operation: &str) {
    API_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a failed attempt of `operation`
pub fn record_api_error(operation: &str, class: ErrorClass) {
    API_ERRORS_TOTAL
        .with_label_values(&[operation, class.as_str()])
        .inc();
}

/// Record a processed change set
///
/// # Arguments
/// * `status` - `success`, `error` or `dry_run`
/// * `duration` - Time spent processing the change set
pub fn record_changeset(status: &str, duration: Duration) {
    CHANGESETS_TOTAL.with_label_values(&[status]).inc();
    CHANGESET_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
