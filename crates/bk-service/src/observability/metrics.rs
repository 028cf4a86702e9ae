//! Metrics definitions for the booking service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `bk_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: the fixed route set, booking ids replaced by `{id}`
//! - `operation`: create, extend, cancel, list
//! - `status`: success or a [`BkError::metric_label`](crate::errors::BkError::metric_label) value
//! - `service`: location, notification

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("bk_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("bk_upstream_call".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set upstream call buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `bk_http_requests_total`, `bk_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("bk_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("bk_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/bookings/create" | "/bookings/getAllBookings" => {
            path.to_string()
        }
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Replace the booking id segment with a placeholder.
fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // /bookings/{action}/{id} → ["", "bookings", action, id]
    if let ["", "bookings", action @ ("delete" | "extend"), id] = parts.as_slice() {
        if !id.is_empty() {
            return format!("/bookings/{}/{{id}}", action);
        }
    }

    "/other".to_string()
}

// ============================================================================
// Booking Lifecycle Metrics
// ============================================================================

/// Record the outcome of a lifecycle operation.
///
/// Metric: `bk_booking_operations_total`
/// Labels: `operation`, `status`
pub fn record_booking_operation(operation: &str, status: &str) {
    counter!("bk_booking_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a compensating action taken after a partial failure.
///
/// Metric: `bk_compensations_total`
/// Labels: `operation`, `status`
pub fn record_compensation(operation: &str, status: &str) {
    counter!("bk_compensations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Upstream Metrics
// ============================================================================

/// Record a call to the location or notification service.
///
/// Metric: `bk_upstream_calls_total`, `bk_upstream_call_duration_seconds`
/// Labels: `service`, `operation`, `status`
pub fn record_upstream_call(service: &str, operation: &str, status: &str, duration: Duration) {
    histogram!("bk_upstream_call_duration_seconds",
        "service" => service.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("bk_upstream_calls_total",
        "service" => service.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Expiry Sweep Metrics
// ============================================================================

/// Record one expiry sweep pass.
///
/// Metric: `bk_expiry_sweeps_total`, `bk_expired_bookings_total`,
/// `bk_expiry_sweep_failures_total`
pub fn record_expiry_sweep(expired: u64, failed: u64) {
    counter!("bk_expiry_sweeps_total").increment(1);
    counter!("bk_expired_bookings_total").increment(expired);
    if failed > 0 {
        counter!("bk_expiry_sweep_failures_total").increment(failed);
    }
}
