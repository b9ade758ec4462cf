//! Metrics definitions for the Session Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sc_` prefix for Session Coordinator
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: 6 values (join, leave, offer, answer, trickle, broadcast)
//! - `status`: success, error
//! - `error_type`: bounded by `ScError::error_type_label`
//! - `method`: 10 values (node RPC methods)
//! - `reason` / `stage`: bounded by code
//!
//! Room, peer and session identifiers are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Node RPC latency buckets - internal service call bounded by the RPC timeout
        .set_buckets_for_metric(
            Matcher::Prefix("sc_rpc".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set RPC latency buckets: {e}"))?
        // Operation duration buckets - joins span several RPCs
        .set_buckets_for_metric(
            Matcher::Prefix("sc_operation".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set operation duration buckets: {e}"))?
        // HTTP request buckets
        .set_buckets_for_metric(
            Matcher::Prefix("sc_http".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Operation Metrics
// ============================================================================

/// Record a completed client operation.
///
/// Metrics: `sc_operations_total`, `sc_operation_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_operation(operation: &'static str, status: &'static str, duration: Duration) {
    counter!("sc_operations_total", "operation" => operation, "status" => status).increment(1);
    histogram!("sc_operation_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a client-visible operation failure.
///
/// Metric: `sc_errors_total`
/// Labels: `operation`, `error_type`
pub fn record_error(operation: &'static str, error_type: &'static str) {
    counter!("sc_errors_total", "operation" => operation, "error_type" => error_type)
        .increment(1);
}

/// Record a best-effort cleanup step that failed and was swallowed.
///
/// Metric: `sc_cleanup_failures_total`
/// Labels: `stage` (evict_peer_leave, leave_peer_leave, list_sessions,
/// resolve_directory, resolve_session, media_leave, rollback_peer_leave)
pub fn record_cleanup_failure(stage: &'static str) {
    counter!("sc_cleanup_failures_total", "stage" => stage).increment(1);
}

// ============================================================================
// Node RPC Metrics
// ============================================================================

/// Record a synchronous node RPC.
///
/// Metrics: `sc_rpc_requests_total`, `sc_rpc_latency_seconds`
/// Labels: `method`, `status` (success, timeout, unreachable, remote, `invalid_reply`)
pub fn record_rpc(method: &'static str, status: &'static str, duration: Duration) {
    counter!("sc_rpc_requests_total", "method" => method, "status" => status).increment(1);
    histogram!("sc_rpc_latency_seconds", "method" => method).record(duration.as_secs_f64());
}

/// Record an asynchronous relay that was dropped or failed delivery.
///
/// Metric: `sc_relay_dropped_total`
/// Labels: `method`, `reason` (`queue_full`, `queue_closed`, delivery)
pub fn record_relay_dropped(method: &'static str, reason: &'static str) {
    counter!("sc_relay_dropped_total", "method" => method, "reason" => reason).increment(1);
}

// ============================================================================
// Registry & Actor Metrics (Gauges)
// ============================================================================

/// Set the number of peers registered on this node.
///
/// Metric: `sc_peers_active`
pub fn set_peers_active(count: usize) {
    // usize to f64 conversion is safe for realistic peer counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_peers_active").set(count as f64);
}

/// Set the number of rooms with at least one peer on this node.
///
/// Metric: `sc_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_rooms_active").set(count as f64);
}

/// Set the number of live peer actors.
///
/// Metric: `sc_peer_actors_active`
pub fn set_peer_actors_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_peer_actors_active").set(count as f64);
}

/// Set the mailbox depth last observed by an actor of `actor_type`.
///
/// Metric: `sc_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &'static str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_actor_mailbox_depth", "actor_type" => actor_type).set(depth as f64);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record an HTTP request on the signaling API.
///
/// Metrics: `sc_http_requests_total`, `sc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(path);
    counter!(
        "sc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
    histogram!(
        "sc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint
    )
    .record(duration.as_secs_f64());
}

/// Map a request path onto a bounded endpoint label.
///
/// Peer IDs in the path are replaced so the label set stays fixed.
fn normalize_endpoint(path: &str) -> &'static str {
    let mut segments = path.trim_matches('/').split('/');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some("api"), Some("v1"), Some("peers"), Some(_), Some(op), None) => match op {
            "join" => "/api/v1/peers/{peer_id}/join",
            "leave" => "/api/v1/peers/{peer_id}/leave",
            "offer" => "/api/v1/peers/{peer_id}/offer",
            "answer" => "/api/v1/peers/{peer_id}/answer",
            "trickle" => "/api/v1/peers/{peer_id}/trickle",
            "broadcast" => "/api/v1/peers/{peer_id}/broadcast",
            _ => "other",
        },
        _ => "other",
    }
}
