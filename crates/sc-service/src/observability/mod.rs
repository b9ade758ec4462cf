//! Observability module for the Session Coordinator.
//!
//! # Privacy by Default
//!
//! Operations are instrumented with `#[instrument(skip_all)]` and explicit
//! fields. Metric labels never carry room, peer or session identifiers.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `sc_operations_total` | Counter | `operation`, `status` | Client operations |
//! | `sc_operation_duration_seconds` | Histogram | `operation` | Client operation latency |
//! | `sc_errors_total` | Counter | `operation`, `error_type` | Client-visible failures |
//! | `sc_cleanup_failures_total` | Counter | `stage` | Swallowed best-effort failures |
//! | `sc_rpc_requests_total` | Counter | `method`, `status` | Synchronous node RPCs |
//! | `sc_rpc_latency_seconds` | Histogram | `method` | Synchronous node RPC latency |
//! | `sc_relay_dropped_total` | Counter | `method`, `reason` | Lost asynchronous relays |
//! | `sc_peers_active` | Gauge | none | Peers registered on this node |
//! | `sc_rooms_active` | Gauge | none | Rooms with local peers |
//! | `sc_peer_actors_active` | Gauge | none | Live peer actors |
//! | `sc_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `sc_http_requests_total` | Counter | `method`, `endpoint`, `status_code` | Signaling API requests |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
