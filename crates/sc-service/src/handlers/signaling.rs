//! Signaling handlers.
//!
//! One endpoint per coordinator operation, the peer ID in the path:
//!
//! - `POST /api/v1/peers/{peer_id}/join` - `JoinResponse`
//! - `POST /api/v1/peers/{peer_id}/leave` - `{}`
//! - `POST /api/v1/peers/{peer_id}/offer` - `NegotiationResponse`
//! - `POST /api/v1/peers/{peer_id}/answer` - `{}`
//! - `POST /api/v1/peers/{peer_id}/trickle` - `{}`
//! - `POST /api/v1/peers/{peer_id}/broadcast` - `{}`
//!
//! Failures are returned as `ScError` JSON bodies.

use crate::coordinator::{
    BroadcastRequest, JoinRequest, JoinResponse, LeaveRequest, NegotiationRequest,
    NegotiationResponse, TrickleRequest,
};
use crate::errors::ScError;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use common::types::PeerId;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Decode a request body, answering 400 rather than axum's default 422.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ScError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(target: "sc.handlers.signaling", error = %e, "Invalid request body");
        ScError::Validation("Invalid request body".to_string())
    })
}

fn ack() -> Json<Value> {
    Json(json!({}))
}

/// Handler for POST /api/v1/peers/{peer_id}/join
///
/// An HTTP caller holds no long-lived connection, so each join gets a fresh
/// connection token; a later join for the same peer cancels it.
pub async fn join(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    body: Bytes,
) -> Result<Json<JoinResponse>, ScError> {
    let request: JoinRequest = parse_body(&body)?;
    let response = state
        .coordinator
        .join(PeerId::from(peer_id), request, CancellationToken::new())
        .await?;
    Ok(Json(response))
}

/// Handler for POST /api/v1/peers/{peer_id}/leave
pub async fn leave(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ScError> {
    let request: LeaveRequest = parse_body(&body)?;
    state
        .coordinator
        .leave(PeerId::from(peer_id), request)
        .await?;
    Ok(ack())
}

/// Handler for POST /api/v1/peers/{peer_id}/offer
pub async fn offer(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    body: Bytes,
) -> Result<Json<NegotiationResponse>, ScError> {
    let request: NegotiationRequest = parse_body(&body)?;
    let response = state
        .coordinator
        .offer(PeerId::from(peer_id), request)
        .await?;
    Ok(Json(response))
}

/// Handler for POST /api/v1/peers/{peer_id}/answer
pub async fn answer(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ScError> {
    let request: NegotiationRequest = parse_body(&body)?;
    state
        .coordinator
        .answer(PeerId::from(peer_id), request)
        .await?;
    Ok(ack())
}

/// Handler for POST /api/v1/peers/{peer_id}/trickle
pub async fn trickle(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ScError> {
    let request: TrickleRequest = parse_body(&body)?;
    state
        .coordinator
        .trickle(PeerId::from(peer_id), request)
        .await?;
    Ok(ack())
}

/// Handler for POST /api/v1/peers/{peer_id}/broadcast
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ScError> {
    let request: BroadcastRequest = parse_body(&body)?;
    state
        .coordinator
        .broadcast(PeerId::from(peer_id), request)
        .await?;
    Ok(ack())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_rejects_garbage_as_validation() {
        let result: Result<LeaveRequest, _> = parse_body(&Bytes::from_static(b"{not json"));
        assert!(matches!(result, Err(ScError::Validation(_))));
    }

    #[test]
    fn test_parse_body_accepts_empty_object_for_leave() {
        let request: LeaveRequest = parse_body(&Bytes::from_static(b"{}")).unwrap();
        assert!(request.room_id.is_empty());
    }
}
