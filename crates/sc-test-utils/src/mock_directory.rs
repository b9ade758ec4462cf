//! Mock directory node.
//!
//! Keeps a real roster: `peer-join` snapshots the room before adding the
//! peer, `list-sessions` answers from the sessions recorded at join,
//! `stream-add` and `broadcast` relays are recorded as they arrive.
//!
//! # Example
//!
//! ```rust,ignore
//! use sc_test_utils::MockDirectory;
//!
//! let directory = MockDirectory::new()
//!     .with_session("r1", "u1", "sess-a")
//!     .failing_peer_leave(503, "directory overloaded");
//! ```

use async_trait::async_trait;
use common::types::{PeerId, RoomId, SessionId};
use sc_service::rpc::{
    ListSessionsReply, NodeRequest, NodeRpc, PeerJoinReply, RosterPeer, RosterStream, RpcError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A relayed broadcast, as received.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedBroadcast {
    pub peer_id: PeerId,
    pub room_id: RoomId,
    pub info: Value,
}

#[derive(Debug, Default)]
struct DirectoryState {
    rosters: HashMap<RoomId, Vec<RosterPeer>>,
    sessions: HashMap<(RoomId, PeerId), Vec<SessionId>>,
    streams: Vec<RosterStream>,
    broadcasts: Vec<ReceivedBroadcast>,
    requests: Vec<NodeRequest>,
}

/// Directory node double implementing [`NodeRpc`].
#[derive(Debug, Default)]
pub struct MockDirectory {
    state: Mutex<DirectoryState>,
    fail_peer_join: Option<RpcError>,
    fail_peer_leave: Option<RpcError>,
    fail_list_sessions: Option<RpcError>,
    drop_relays: bool,
    dropped_relays: AtomicUsize,
}

impl MockDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session as owned by (room, peer), as if joined elsewhere.
    #[must_use]
    pub fn with_session(self, room: &str, peer: &str, session: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .sessions
            .entry((room.into(), peer.into()))
            .or_default()
            .push(session.into());
        self
    }

    /// Put a peer in a room's roster, as if joined through another coordinator.
    #[must_use]
    pub fn with_roster_peer(self, room: &str, peer: &str, info: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .rosters
            .entry(room.into())
            .or_default()
            .push(RosterPeer {
                peer_id: peer.into(),
                info,
            });
        self
    }

    #[must_use]
    pub fn failing_peer_join(mut self, code: i32, reason: &str) -> Self {
        self.fail_peer_join = Some(remote(code, reason));
        self
    }

    #[must_use]
    pub fn failing_peer_leave(mut self, code: i32, reason: &str) -> Self {
        self.fail_peer_leave = Some(remote(code, reason));
        self
    }

    #[must_use]
    pub fn failing_list_sessions(mut self, code: i32, reason: &str) -> Self {
        self.fail_list_sessions = Some(remote(code, reason));
        self
    }

    /// Silently lose every relayed message, like a bus with no subscriber.
    #[must_use]
    pub fn dropping_relays(mut self) -> Self {
        self.drop_relays = true;
        self
    }

    /// Every request and relay received, in arrival order.
    pub fn requests(&self) -> Vec<NodeRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Number of requests and relays received with the given wire method.
    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method() == method)
            .count()
    }

    pub fn roster(&self, room: &RoomId) -> Vec<PeerId> {
        self.state
            .lock()
            .unwrap()
            .rosters
            .get(room)
            .map(|peers| peers.iter().map(|p| p.peer_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn sessions_of(&self, room: &RoomId, peer: &PeerId) -> Vec<SessionId> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(&(room.clone(), peer.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Streams recorded for sessions owned in `room`.
    pub fn streams_in(&self, room: &RoomId) -> Vec<RosterStream> {
        let state = self.state.lock().unwrap();
        state
            .streams
            .iter()
            .filter(|s| in_room(&state.sessions, s, room))
            .cloned()
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<ReceivedBroadcast> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn dropped_relays(&self) -> usize {
        self.dropped_relays.load(Ordering::SeqCst)
    }

    fn peer_join(
        state: &mut DirectoryState,
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        info: Value,
    ) -> PeerJoinReply {
        let roster = state.rosters.entry(room_id.clone()).or_default();
        let peers: Vec<RosterPeer> = roster
            .iter()
            .filter(|p| p.peer_id != peer_id)
            .cloned()
            .collect();
        roster.retain(|p| p.peer_id != peer_id);
        roster.push(RosterPeer {
            peer_id: peer_id.clone(),
            info,
        });

        let streams = state
            .streams
            .iter()
            .filter(|s| s.peer_id != peer_id && in_room(&state.sessions, s, &room_id))
            .cloned()
            .collect();

        state
            .sessions
            .entry((room_id, peer_id))
            .or_default()
            .push(session_id.clone());

        PeerJoinReply {
            peers,
            streams,
            directory_session: Some(format!("dir-{session_id}")),
        }
    }
}

fn remote(code: i32, reason: &str) -> RpcError {
    RpcError::Remote {
        code,
        reason: reason.to_string(),
    }
}

/// A stream is in a room if its session was recorded for that room.
fn in_room(
    sessions: &HashMap<(RoomId, PeerId), Vec<SessionId>>,
    stream: &RosterStream,
    room: &RoomId,
) -> bool {
    sessions
        .get(&(room.clone(), stream.peer_id.clone()))
        .is_some_and(|owned| owned.contains(&stream.session_id))
}

fn to_value<T: serde::Serialize>(reply: &T) -> Result<Value, RpcError> {
    serde_json::to_value(reply).map_err(|e| RpcError::InvalidReply(e.to_string()))
}

#[async_trait]
impl NodeRpc for MockDirectory {
    async fn request(&self, request: NodeRequest) -> Result<Value, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        match request {
            NodeRequest::PeerJoin {
                peer_id,
                room_id,
                session_id,
                info,
            } => {
                if let Some(e) = &self.fail_peer_join {
                    return Err(e.clone());
                }
                let reply = Self::peer_join(&mut state, peer_id, room_id, session_id, info);
                to_value(&reply)
            }
            NodeRequest::PeerLeave { peer_id, room_id } => {
                if let Some(e) = &self.fail_peer_leave {
                    return Err(e.clone());
                }
                if let Some(roster) = state.rosters.get_mut(&room_id) {
                    roster.retain(|p| p.peer_id != peer_id);
                }
                let DirectoryState {
                    sessions, streams, ..
                } = &mut *state;
                streams.retain(|s| !(s.peer_id == peer_id && in_room(sessions, s, &room_id)));
                Ok(Value::Null)
            }
            NodeRequest::ListSessions { peer_id, room_id } => {
                if let Some(e) = &self.fail_list_sessions {
                    return Err(e.clone());
                }
                let session_ids = state
                    .sessions
                    .get(&(room_id, peer_id))
                    .cloned()
                    .unwrap_or_default();
                to_value(&ListSessionsReply { session_ids })
            }
            other => Err(remote(501, &format!("directory does not handle {}", other.method()))),
        }
    }

    fn notify(&self, request: NodeRequest) {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        if self.drop_relays {
            self.dropped_relays.fetch_add(1, Ordering::SeqCst);
            return;
        }

        match request {
            NodeRequest::StreamAdd {
                peer_id,
                session_id,
                stream_id,
                ..
            } => state.streams.push(RosterStream {
                peer_id,
                session_id,
                stream_id,
            }),
            NodeRequest::Broadcast {
                peer_id,
                room_id,
                info,
            } => state.broadcasts.push(ReceivedBroadcast {
                peer_id,
                room_id,
                info,
            }),
            _ => {}
        }
    }
}
