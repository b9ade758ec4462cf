//! HTTP routes for the signaling API.
//!
//! Health and metrics are served separately by
//! [`health_router`](crate::observability::health_router).

use crate::coordinator::SessionCoordinator;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use axum::{middleware, routing::post, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
}

/// Build the signaling API router.
///
/// Layer order (bottom-to-top execution):
/// 1. TimeoutLayer - 30 second request timeout (innermost)
/// 2. TraceLayer - request logging
/// 3. http_metrics_middleware - records every response (outermost)
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/peers/:peer_id/join", post(handlers::join))
        .route("/api/v1/peers/:peer_id/leave", post(handlers::leave))
        .route("/api/v1/peers/:peer_id/offer", post(handlers::offer))
        .route("/api/v1/peers/:peer_id/answer", post(handlers::answer))
        .route("/api/v1/peers/:peer_id/trickle", post(handlers::trickle))
        .route("/api/v1/peers/:peer_id/broadcast", post(handlers::broadcast))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
