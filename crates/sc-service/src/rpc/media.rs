//! Typed client for media nodes.

use super::directory::decode;
use super::messages::{Jsep, MediaJoinReply, MediaOfferReply, NodeRequest};
use super::{NodeRpc, RpcError};
use crate::cluster::SessionKey;
use serde_json::Value;
use std::sync::Arc;

/// Media RPCs over the node a session is bound to.
#[derive(Clone)]
pub struct MediaClient {
    rpc: Arc<dyn NodeRpc>,
}

impl MediaClient {
    #[must_use]
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self { rpc }
    }

    /// Establish the session from the client's offer; returns the node's answer.
    pub async fn join(
        &self,
        key: &SessionKey,
        directory_session: Option<String>,
        jsep: Jsep,
        info: Value,
    ) -> Result<MediaJoinReply, RpcError> {
        let reply = self
            .rpc
            .request(NodeRequest::MediaJoin {
                peer_id: key.peer_id.clone(),
                room_id: key.room_id.clone(),
                session_id: key.session_id.clone(),
                directory_session,
                jsep,
                info,
            })
            .await?;
        decode(reply)
    }

    /// Tear the session down.
    pub async fn leave(&self, key: &SessionKey) -> Result<(), RpcError> {
        self.rpc
            .request(NodeRequest::MediaLeave {
                peer_id: key.peer_id.clone(),
                room_id: key.room_id.clone(),
                session_id: key.session_id.clone(),
            })
            .await
            .map(|_| ())
    }

    /// Forward a renegotiation offer; returns the node's answer.
    pub async fn offer(&self, key: &SessionKey, jsep: Jsep) -> Result<Jsep, RpcError> {
        let reply = self
            .rpc
            .request(NodeRequest::MediaOffer {
                peer_id: key.peer_id.clone(),
                room_id: key.room_id.clone(),
                session_id: key.session_id.clone(),
                jsep,
            })
            .await?;
        decode::<MediaOfferReply>(reply).map(|r| r.jsep)
    }

    /// Forward a renegotiation answer.
    pub async fn answer(&self, key: &SessionKey, jsep: Jsep) -> Result<(), RpcError> {
        self.rpc
            .request(NodeRequest::MediaAnswer {
                peer_id: key.peer_id.clone(),
                room_id: key.room_id.clone(),
                session_id: key.session_id.clone(),
                jsep,
            })
            .await
            .map(|_| ())
    }

    /// Relay one ICE candidate. Never awaited.
    pub fn trickle(&self, key: &SessionKey, candidate: Value) {
        self.rpc.notify(NodeRequest::MediaTrickle {
            peer_id: key.peer_id.clone(),
            room_id: key.room_id.clone(),
            session_id: key.session_id.clone(),
            candidate,
        });
    }
}
