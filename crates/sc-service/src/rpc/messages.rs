//! Node RPC wire messages.
//!
//! Every request is one [`NodeRequest`] variant, serialized as
//! `{"method": "<kebab-case name>", "params": {...}}`.

use common::types::{PeerId, RoomId, SessionId, StreamId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a negotiation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Negotiation descriptor (session description plus its type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl Jsep {
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Requests sent to directory and media nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "kebab-case")]
pub enum NodeRequest {
    /// Directory: register a peer; replies with the room roster.
    PeerJoin {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        info: Value,
    },
    /// Directory: remove a peer from the room.
    PeerLeave { peer_id: PeerId, room_id: RoomId },
    /// Directory: sessions owned by a peer in a room.
    ListSessions { peer_id: PeerId, room_id: RoomId },
    /// Directory: record stream ownership. Relayed.
    StreamAdd {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        stream_id: StreamId,
    },
    /// Directory: application-level fan-out to room members. Relayed.
    Broadcast {
        peer_id: PeerId,
        room_id: RoomId,
        info: Value,
    },
    /// Media: establish a session from the client's offer.
    MediaJoin {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        directory_session: Option<String>,
        jsep: Jsep,
        info: Value,
    },
    /// Media: tear a session down.
    MediaLeave {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
    },
    /// Media: renegotiation offer; replies with an answer.
    MediaOffer {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        jsep: Jsep,
    },
    /// Media: renegotiation answer; acknowledged without payload.
    MediaAnswer {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        jsep: Jsep,
    },
    /// Media: one ICE candidate. Relayed.
    MediaTrickle {
        peer_id: PeerId,
        room_id: RoomId,
        session_id: SessionId,
        candidate: Value,
    },
}

impl NodeRequest {
    /// Wire method name, also used as a bounded metric label.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            NodeRequest::PeerJoin { .. } => "peer-join",
            NodeRequest::PeerLeave { .. } => "peer-leave",
            NodeRequest::ListSessions { .. } => "list-sessions",
            NodeRequest::StreamAdd { .. } => "stream-add",
            NodeRequest::Broadcast { .. } => "broadcast",
            NodeRequest::MediaJoin { .. } => "media-join",
            NodeRequest::MediaLeave { .. } => "media-leave",
            NodeRequest::MediaOffer { .. } => "media-offer",
            NodeRequest::MediaAnswer { .. } => "media-answer",
            NodeRequest::MediaTrickle { .. } => "media-trickle",
        }
    }
}

/// A peer already present in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterPeer {
    pub peer_id: PeerId,
    #[serde(default)]
    pub info: Value,
}

/// A stream already declared in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterStream {
    pub peer_id: PeerId,
    pub session_id: SessionId,
    pub stream_id: StreamId,
}

/// Directory reply to `peer-join`: the roster as of registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerJoinReply {
    #[serde(default)]
    pub peers: Vec<RosterPeer>,
    #[serde(default)]
    pub streams: Vec<RosterStream>,
    /// Directory-side session reference, forwarded to the media node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_session: Option<String>,
}

/// Directory reply to `list-sessions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSessionsReply {
    #[serde(default)]
    pub session_ids: Vec<SessionId>,
}

/// Media reply to `media-join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaJoinReply {
    pub jsep: Jsep,
    #[serde(default)]
    pub info: Value,
}

/// Media reply to `media-offer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOfferReply {
    pub jsep: Jsep,
}
