//! Client-facing request and response types for the six operations.
//!
//! Room IDs and session IDs default to empty when absent so that a missing
//! field surfaces as a validation or resolution failure from the coordinator
//! rather than a body rejection. An empty session ID on leave reads as absent.
//! The join payload stays raw JSON until the coordinator decodes it, so a
//! malformed one is a parse failure.

use crate::rpc::{Jsep, RosterPeer, RosterStream};
use common::types::{RoomId, SessionId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Join a room with an initial offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub room_id: RoomId,
    /// Negotiation payload; must decode as an offer [`Jsep`].
    #[serde(default)]
    pub jsep: Value,
    /// Opaque application payload, forwarded to the directory and media node.
    #[serde(default)]
    pub info: Value,
}

/// Successful join: roster snapshot plus the media node's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub peers: Vec<RosterPeer>,
    pub streams: Vec<RosterStream>,
    pub session_id: SessionId,
    pub jsep: Jsep,
    #[serde(default)]
    pub info: Value,
}

/// Leave a room, tearing down one session or all of the peer's sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(
        default,
        deserialize_with = "non_empty_session",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<SessionId>,
}

fn non_empty_session<'de, D>(deserializer: D) -> Result<Option<SessionId>, D::Error>
where
    D: Deserializer<'de>,
{
    let session_id = Option::<SessionId>::deserialize(deserializer)?;
    Ok(session_id.filter(|s| !s.is_empty()))
}

/// Renegotiation offer or answer for an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRequest {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub session_id: SessionId,
    pub jsep: Jsep,
}

/// The media node's answer to a renegotiation offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationResponse {
    pub room_id: RoomId,
    pub session_id: SessionId,
    pub jsep: Jsep,
}

/// One ICE candidate for an existing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickleRequest {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub session_id: SessionId,
    pub candidate: Value,
}

/// Application payload for every member of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub info: Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_request_defaults() {
        let request: JoinRequest = serde_json::from_value(json!({
            "jsep": {"type": "offer", "sdp": "v=0"}
        }))
        .unwrap();
        assert!(request.room_id.is_empty());
        assert!(request.info.is_null());
    }

    #[test]
    fn test_join_request_keeps_malformed_payload() {
        let request: JoinRequest = serde_json::from_value(json!({
            "room_id": "r1",
            "jsep": {"type": "bogus"}
        }))
        .unwrap();
        assert_eq!(request.jsep, json!({"type": "bogus"}));

        let request: JoinRequest = serde_json::from_value(json!({"room_id": "r1"})).unwrap();
        assert!(request.jsep.is_null());
    }

    #[test]
    fn test_leave_request_session_is_optional() {
        let request: LeaveRequest = serde_json::from_value(json!({"room_id": "r1"})).unwrap();
        assert_eq!(request.room_id, RoomId::from("r1"));
        assert!(request.session_id.is_none());

        let request: LeaveRequest =
            serde_json::from_value(json!({"room_id": "r1", "session_id": "s1"})).unwrap();
        assert_eq!(request.session_id, Some(SessionId::from("s1")));

        for body in [
            json!({"room_id": "r1", "session_id": ""}),
            json!({"room_id": "r1", "session_id": null}),
        ] {
            let request: LeaveRequest = serde_json::from_value(body).unwrap();
            assert!(request.session_id.is_none());
        }
    }

    #[test]
    fn test_trickle_requires_candidate() {
        let result: Result<TrickleRequest, _> =
            serde_json::from_value(json!({"room_id": "r1", "session_id": "s1"}));
        assert!(result.is_err());
    }
}
