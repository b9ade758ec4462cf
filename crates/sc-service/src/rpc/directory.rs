//! Typed client for the directory service.

use super::messages::{ListSessionsReply, NodeRequest, PeerJoinReply};
use super::{NodeRpc, RpcError};
use common::types::{PeerId, RoomId, SessionId, StreamId};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Directory RPCs over a resolved directory node.
#[derive(Clone)]
pub struct DirectoryClient {
    rpc: Arc<dyn NodeRpc>,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self { rpc }
    }

    /// Register a peer and return the room roster as of registration.
    pub async fn peer_join(
        &self,
        peer_id: &PeerId,
        room_id: &RoomId,
        session_id: &SessionId,
        info: Value,
    ) -> Result<PeerJoinReply, RpcError> {
        let reply = self
            .rpc
            .request(NodeRequest::PeerJoin {
                peer_id: peer_id.clone(),
                room_id: room_id.clone(),
                session_id: session_id.clone(),
                info,
            })
            .await?;
        decode(reply)
    }

    /// Remove a peer from the room. Callers treat failures as best effort.
    pub async fn peer_leave(&self, peer_id: &PeerId, room_id: &RoomId) -> Result<(), RpcError> {
        self.rpc
            .request(NodeRequest::PeerLeave {
                peer_id: peer_id.clone(),
                room_id: room_id.clone(),
            })
            .await
            .map(|_| ())
    }

    /// Sessions the directory records for a peer in a room.
    pub async fn list_sessions(
        &self,
        peer_id: &PeerId,
        room_id: &RoomId,
    ) -> Result<Vec<SessionId>, RpcError> {
        let reply = self
            .rpc
            .request(NodeRequest::ListSessions {
                peer_id: peer_id.clone(),
                room_id: room_id.clone(),
            })
            .await?;
        decode::<ListSessionsReply>(reply).map(|r| r.session_ids)
    }

    /// Relay stream ownership. Never awaited.
    pub fn stream_add(
        &self,
        peer_id: &PeerId,
        room_id: &RoomId,
        session_id: &SessionId,
        stream_id: StreamId,
    ) {
        self.rpc.notify(NodeRequest::StreamAdd {
            peer_id: peer_id.clone(),
            room_id: room_id.clone(),
            session_id: session_id.clone(),
            stream_id,
        });
    }

    /// Relay an application payload to the room. Never awaited.
    pub fn broadcast(&self, peer_id: &PeerId, room_id: &RoomId, info: Value) {
        self.rpc.notify(NodeRequest::Broadcast {
            peer_id: peer_id.clone(),
            room_id: room_id.clone(),
            info,
        });
    }
}

/// Decode a reply payload. A missing payload decodes as an empty object.
pub(super) fn decode<T: DeserializeOwned>(reply: Value) -> Result<T, RpcError> {
    let reply = if reply.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        reply
    };
    serde_json::from_value(reply).map_err(|e| RpcError::InvalidReply(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_reply_decodes_as_defaults() {
        let reply: PeerJoinReply = decode(Value::Null).unwrap();
        assert_eq!(reply, PeerJoinReply::default());
    }

    #[test]
    fn test_wrong_shape_is_invalid_reply() {
        let err = decode::<ListSessionsReply>(json!({ "session_ids": 7 })).unwrap_err();
        assert!(matches!(err, RpcError::InvalidReply(_)), "got {err:?}");
    }
}
