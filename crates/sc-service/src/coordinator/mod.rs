//! Session coordinator: the six client-facing operations.
//!
//! Join and leave for a (room, peer) key are serialized through that key's
//! peer actor. Offer, answer, trickle and broadcast run directly on the
//! caller's task; they touch no local state beyond reading session bindings.
//!
//! Every operation records `sc_operations_total` and, on failure,
//! `sc_errors_total`.

mod messages;
mod negotiation;

pub use messages::{
    BroadcastRequest, JoinRequest, JoinResponse, LeaveRequest, NegotiationRequest,
    NegotiationResponse, TrickleRequest,
};

use crate::actors::{AdmitRequest, PeerActors, PeerKey};
use crate::cluster::{NodeKind, NodeResolver, ResolveScope};
use crate::errors::ScError;
use crate::observability::metrics;
use crate::registry::PeerRegistry;
use crate::rpc::{DirectoryClient, Jsep, SdpType};
use crate::sdp::SessionDescription;
use common::types::{PeerId, RoomId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Time allowed for peer actors to finish in-flight work on shutdown.
const ACTOR_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Shared state every operation works against.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub resolver: Arc<dyn NodeResolver>,
    pub registry: Arc<PeerRegistry>,
}

impl CoordinatorContext {
    #[must_use]
    pub fn new(resolver: Arc<dyn NodeResolver>, registry: Arc<PeerRegistry>) -> Self {
        Self { resolver, registry }
    }
}

/// The session coordinator.
pub struct SessionCoordinator {
    ctx: CoordinatorContext,
    actors: PeerActors,
}

impl SessionCoordinator {
    /// Create a coordinator. Peer actors exit after `idle_timeout` without
    /// messages and stop when `cancel_token` is cancelled.
    #[must_use]
    pub fn new(
        ctx: CoordinatorContext,
        idle_timeout: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        let actors = PeerActors::new(ctx.clone(), cancel_token, idle_timeout);
        Self { ctx, actors }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.ctx.registry
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn NodeResolver> {
        &self.ctx.resolver
    }

    #[must_use]
    pub fn actors(&self) -> &PeerActors {
        &self.actors
    }

    /// Admit `peer_id` into a room with an initial offer.
    ///
    /// `connection` is the peer's local connection handle; it is cancelled if
    /// a later join for the same (room, peer) evicts this one.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty room or peer ID
    /// - `Parse` for a payload that is not a well-formed offer
    /// - `Resolution` when no directory or media node is available
    /// - `Remote` when directory or media registration fails
    #[instrument(
        skip_all,
        name = "sc.coordinator.join",
        fields(room_id = %request.room_id, peer_id = %peer_id)
    )]
    pub async fn join(
        &self,
        peer_id: PeerId,
        request: JoinRequest,
        connection: CancellationToken,
    ) -> Result<JoinResponse, ScError> {
        let start = Instant::now();
        let result = self.admit(peer_id, request, connection).await;
        record_outcome("join", &result, start);
        result
    }

    async fn admit(
        &self,
        peer_id: PeerId,
        request: JoinRequest,
        connection: CancellationToken,
    ) -> Result<JoinResponse, ScError> {
        require_room(&request.room_id)?;
        if peer_id.is_empty() {
            return Err(ScError::Validation("peer_id is required".to_string()));
        }

        let jsep: Jsep = serde_json::from_value(request.jsep)
            .map_err(|e| ScError::Parse(format!("invalid negotiation payload: {e}")))?;
        if jsep.sdp_type != SdpType::Offer {
            return Err(ScError::Parse("join requires an offer".to_string()));
        }
        let description = SessionDescription::parse(&jsep.sdp)?;

        let directory = self
            .ctx
            .resolver
            .resolve(NodeKind::Directory, ResolveScope::Cluster)
            .await?;

        let key = PeerKey::new(request.room_id, peer_id);
        let admit = AdmitRequest {
            directory: DirectoryClient::new(directory.rpc),
            jsep,
            streams: description.into_streams(),
            info: request.info,
            connection,
        };
        self.actors.join(key, admit).await
    }

    /// Remove `peer_id` from a room and tear down its sessions.
    ///
    /// Cleanup is best effort: downstream failures are logged and counted,
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns `Internal` only if the coordinator is shutting down.
    #[instrument(
        skip_all,
        name = "sc.coordinator.leave",
        fields(room_id = %request.room_id, peer_id = %peer_id)
    )]
    pub async fn leave(&self, peer_id: PeerId, request: LeaveRequest) -> Result<(), ScError> {
        let start = Instant::now();
        let key = PeerKey::new(request.room_id, peer_id);
        let result = self.actors.leave(key, request.session_id).await;
        record_outcome("leave", &result, start);
        result
    }

    /// Stop all peer actors, waiting for in-flight joins and leaves.
    pub async fn shutdown(&self) {
        self.actors.shutdown(ACTOR_SHUTDOWN_DEADLINE).await;
    }
}

pub(crate) fn require_room(room_id: &RoomId) -> Result<(), ScError> {
    if room_id.is_empty() {
        return Err(ScError::Validation("room_id is required".to_string()));
    }
    Ok(())
}

pub(crate) fn record_outcome<T>(
    operation: &'static str,
    result: &Result<T, ScError>,
    start: Instant,
) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => {
            debug!(
                target: "sc.coordinator",
                operation,
                error = %e,
                "Operation failed"
            );
            metrics::record_error(operation, e.error_type_label());
            "error"
        }
    };
    metrics::record_operation(operation, status, start.elapsed());
}
