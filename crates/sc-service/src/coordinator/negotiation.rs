//! Renegotiation and room signaling: offer, answer, trickle, broadcast.
//!
//! Offer, answer and trickle go to the media node the session was bound to
//! at join; they never allocate. Broadcast goes to the directory.

use super::messages::{
    BroadcastRequest, NegotiationRequest, NegotiationResponse, TrickleRequest,
};
use super::{record_outcome, require_room, SessionCoordinator};
use crate::cluster::{NodeKind, ResolveScope, ResolvedNode, SessionKey};
use crate::errors::ScError;
use crate::rpc::{DirectoryClient, MediaClient};
use common::types::{PeerId, RoomId};
use std::time::Instant;
use tracing::{debug, instrument};

impl SessionCoordinator {
    /// Forward a renegotiation offer to the session's media node and return
    /// its answer.
    ///
    /// # Errors
    ///
    /// `Resolution` if the session is not bound to a live node; `Remote`
    /// with the node's code and reason if it rejects the offer.
    #[instrument(
        skip_all,
        name = "sc.coordinator.offer",
        fields(room_id = %request.room_id, peer_id = %peer_id, session_id = %request.session_id)
    )]
    pub async fn offer(
        &self,
        peer_id: PeerId,
        request: NegotiationRequest,
    ) -> Result<NegotiationResponse, ScError> {
        let start = Instant::now();
        let result = self.forward_offer(peer_id, request).await;
        record_outcome("offer", &result, start);
        result
    }

    async fn forward_offer(
        &self,
        peer_id: PeerId,
        request: NegotiationRequest,
    ) -> Result<NegotiationResponse, ScError> {
        let key = SessionKey::new(peer_id, request.room_id, request.session_id);
        let node = self.bound_node(&key).await?;
        let jsep = MediaClient::new(node.rpc).offer(&key, request.jsep).await?;

        Ok(NegotiationResponse {
            room_id: key.room_id,
            session_id: key.session_id,
            jsep,
        })
    }

    /// Forward a renegotiation answer to the session's media node.
    ///
    /// # Errors
    ///
    /// Same as [`SessionCoordinator::offer`].
    #[instrument(
        skip_all,
        name = "sc.coordinator.answer",
        fields(room_id = %request.room_id, peer_id = %peer_id, session_id = %request.session_id)
    )]
    pub async fn answer(&self, peer_id: PeerId, request: NegotiationRequest) -> Result<(), ScError> {
        let start = Instant::now();
        let result = self.forward_answer(peer_id, request).await;
        record_outcome("answer", &result, start);
        result
    }

    async fn forward_answer(
        &self,
        peer_id: PeerId,
        request: NegotiationRequest,
    ) -> Result<(), ScError> {
        let key = SessionKey::new(peer_id, request.room_id, request.session_id);
        let node = self.bound_node(&key).await?;
        MediaClient::new(node.rpc).answer(&key, request.jsep).await?;
        Ok(())
    }

    /// Relay one ICE candidate to the session's media node.
    ///
    /// Returns as soon as the relay is handed over; relay failures are
    /// never reported here.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty room ID, `Resolution` if the session is not
    /// bound to a live node.
    #[instrument(
        skip_all,
        name = "sc.coordinator.trickle",
        fields(room_id = %request.room_id, peer_id = %peer_id, session_id = %request.session_id)
    )]
    pub async fn trickle(&self, peer_id: PeerId, request: TrickleRequest) -> Result<(), ScError> {
        let start = Instant::now();
        let result = self.relay_candidate(peer_id, request).await;
        record_outcome("trickle", &result, start);
        result
    }

    async fn relay_candidate(&self, peer_id: PeerId, request: TrickleRequest) -> Result<(), ScError> {
        require_room(&request.room_id)?;
        let key = SessionKey::new(peer_id, request.room_id, request.session_id);
        let node = self.bound_node(&key).await?;
        MediaClient::new(node.rpc).trickle(&key, request.candidate);
        Ok(())
    }

    /// Relay an application payload to every member of the room.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty room ID, `Resolution` if no directory node
    /// is available.
    #[instrument(
        skip_all,
        name = "sc.coordinator.broadcast",
        fields(room_id = %request.room_id, peer_id = %peer_id)
    )]
    pub async fn broadcast(&self, peer_id: PeerId, request: BroadcastRequest) -> Result<(), ScError> {
        let start = Instant::now();
        let result = self.relay_broadcast(&peer_id, &request.room_id, request.info).await;
        record_outcome("broadcast", &result, start);
        result
    }

    async fn relay_broadcast(
        &self,
        peer_id: &PeerId,
        room_id: &RoomId,
        info: serde_json::Value,
    ) -> Result<(), ScError> {
        require_room(room_id)?;
        let directory = self
            .resolver()
            .resolve(NodeKind::Directory, ResolveScope::Cluster)
            .await?;
        DirectoryClient::new(directory.rpc).broadcast(peer_id, room_id, info);
        Ok(())
    }

    /// The media node a session was bound to at join.
    async fn bound_node(&self, key: &SessionKey) -> Result<ResolvedNode, ScError> {
        let node = self
            .resolver()
            .resolve(NodeKind::Media, ResolveScope::Bound(key.clone()))
            .await?;
        debug!(
            target: "sc.coordinator",
            session_id = %key.session_id,
            media_node = %node.info.id,
            "Resolved bound media node"
        );
        Ok(node)
    }
}
