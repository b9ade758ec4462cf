//! Message types for peer actors.
//!
//! Request-reply uses `tokio::sync::oneshot`.

use crate::coordinator::JoinResponse;
use crate::errors::ScError;
use crate::rpc::{DirectoryClient, Jsep};
use common::types::{PeerId, RoomId, SessionId, StreamId};
use serde_json::Value;
use std::fmt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Identity of a peer actor: one per (room, peer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub room_id: RoomId,
    pub peer_id: PeerId,
}

impl PeerKey {
    #[must_use]
    pub fn new(room_id: RoomId, peer_id: PeerId) -> Self {
        Self { room_id, peer_id }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_id, self.peer_id)
    }
}

/// A join that has passed validation, payload inspection and directory
/// resolution.
pub struct AdmitRequest {
    /// Directory resolved for this join.
    pub directory: DirectoryClient,
    /// The client's offer, forwarded to the media node unchanged.
    pub jsep: Jsep,
    /// Streams declared in the offer.
    pub streams: Vec<StreamId>,
    pub info: Value,
    /// Cancelled to sever the peer's local connection on eviction.
    pub connection: CancellationToken,
}

impl fmt::Debug for AdmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmitRequest")
            .field("jsep", &self.jsep)
            .field("streams", &self.streams)
            .finish_non_exhaustive()
    }
}

/// Messages sent to a `PeerActor`.
#[derive(Debug)]
pub enum PeerMessage {
    /// Admit the peer into the room.
    Join {
        request: AdmitRequest,
        respond_to: oneshot::Sender<Result<JoinResponse, ScError>>,
    },

    /// Remove the peer from the room and tear down its sessions.
    ///
    /// With `session_id` only that session is torn down; without it every
    /// session the directory records for the peer is.
    Leave {
        session_id: Option<SessionId>,
        respond_to: oneshot::Sender<()>,
    },
}
