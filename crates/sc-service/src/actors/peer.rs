//! `PeerActor` - one actor per (room, peer) key.
//!
//! Joins and leaves for the same key are applied strictly in arrival order:
//! the actor handles one message to completion before taking the next.
//! Different keys run in parallel on different actors.
//!
//! # Lifecycle
//!
//! 1. Spawned by [`PeerActors`](super::PeerActors) on the first join or leave
//!    for a key
//! 2. If it replaces an actor that went idle, waits for that actor to finish
//! 3. Exits after `idle_timeout` without messages, once its mailbox is drained
//! 4. Cancellation via child token propagates from the supervisor

use super::messages::{AdmitRequest, PeerKey, PeerMessage};
use super::metrics::{ActorMetrics, MailboxMonitor};
use crate::cluster::{NodeKind, ResolveScope, SessionKey};
use crate::coordinator::{CoordinatorContext, JoinResponse};
use crate::errors::ScError;
use crate::observability::metrics;
use crate::registry::LocalPeer;
use crate::rpc::{DirectoryClient, MediaClient};
use common::types::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the peer mailbox.
const PEER_CHANNEL_BUFFER: usize = 64;

/// Handle to a `PeerActor`.
#[derive(Clone, Debug)]
pub struct PeerActorHandle {
    sender: mpsc::Sender<PeerMessage>,
    /// Cancelled once the actor task has fully exited.
    finished: CancellationToken,
    key: PeerKey,
}

impl PeerActorHandle {
    #[must_use]
    pub fn key(&self) -> &PeerKey {
        &self.key
    }

    /// Hand a message to the actor.
    ///
    /// Gives the message back if the actor has stopped accepting messages.
    pub async fn deliver(&self, message: PeerMessage) -> Result<(), PeerMessage> {
        self.sender.send(message).await.map_err(|e| e.0)
    }

    /// True once the actor no longer accepts messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Token cancelled when the actor task has exited.
    #[must_use]
    pub fn finished(&self) -> CancellationToken {
        self.finished.clone()
    }
}

/// The `PeerActor` implementation.
pub struct PeerActor {
    key: PeerKey,
    ctx: CoordinatorContext,
    receiver: mpsc::Receiver<PeerMessage>,
    cancel_token: CancellationToken,
    idle_timeout: Duration,
    /// Finished token of the actor this one replaces.
    predecessor: Option<CancellationToken>,
    finished: CancellationToken,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl PeerActor {
    /// Spawn a new peer actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        key: PeerKey,
        ctx: CoordinatorContext,
        cancel_token: CancellationToken,
        idle_timeout: Duration,
        predecessor: Option<CancellationToken>,
        metrics: Arc<ActorMetrics>,
    ) -> (PeerActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(PEER_CHANNEL_BUFFER);
        let finished = CancellationToken::new();

        let actor = Self {
            mailbox: MailboxMonitor::new(key.to_string()),
            key: key.clone(),
            ctx,
            receiver,
            cancel_token,
            idle_timeout,
            predecessor,
            finished: finished.clone(),
            metrics,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = PeerActorHandle {
            sender,
            finished,
            key,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(
        skip_all,
        name = "sc.actor.peer",
        fields(room_id = %self.key.room_id, peer_id = %self.key.peer_id)
    )]
    async fn run(mut self) {
        // Fires on every exit path, including unwinding.
        let _finished = self.finished.clone().drop_guard();
        self.metrics.actor_started();

        debug!(
            target: "sc.actor.peer",
            room_id = %self.key.room_id,
            peer_id = %self.key.peer_id,
            "PeerActor started"
        );

        if self.await_predecessor().await {
            self.message_loop().await;
        }

        self.metrics.actor_stopped();
        debug!(
            target: "sc.actor.peer",
            room_id = %self.key.room_id,
            peer_id = %self.key.peer_id,
            messages_processed = self.mailbox.messages_processed(),
            "PeerActor stopped"
        );
    }

    /// Wait until the replaced actor has exited. Returns false on cancellation.
    async fn await_predecessor(&mut self) -> bool {
        let Some(predecessor) = self.predecessor.take() else {
            return true;
        };
        tokio::select! {
            () = predecessor.cancelled() => true,
            () = self.cancel_token.cancelled() => false,
        }
    }

    async fn message_loop(&mut self) {
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "sc.actor.peer",
                        room_id = %self.key.room_id,
                        peer_id = %self.key.peer_id,
                        pending = self.receiver.len(),
                        "PeerActor received cancellation signal"
                    );
                    break;
                }

                msg = tokio::time::timeout(self.idle_timeout, self.receiver.recv()) => {
                    match msg {
                        Ok(Some(message)) => {
                            self.mailbox.observe(self.receiver.len());
                            self.handle_message(message).await;
                            self.mailbox.record_processed();
                            self.metrics.record_message_processed();
                        }
                        Ok(None) => break,
                        Err(_elapsed) => {
                            self.retire().await;
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Stop accepting messages and handle whatever was already queued.
    async fn retire(&mut self) {
        self.receiver.close();
        while let Ok(message) = self.receiver.try_recv() {
            self.handle_message(message).await;
            self.mailbox.record_processed();
            self.metrics.record_message_processed();
        }
        debug!(
            target: "sc.actor.peer",
            room_id = %self.key.room_id,
            peer_id = %self.key.peer_id,
            "PeerActor idle, retiring"
        );
    }

    async fn handle_message(&self, message: PeerMessage) {
        match message {
            PeerMessage::Join {
                request,
                respond_to,
            } => {
                let result = self.handle_join(request).await;
                let _ = respond_to.send(result);
            }

            PeerMessage::Leave {
                session_id,
                respond_to,
            } => {
                self.handle_leave(session_id).await;
                let _ = respond_to.send(());
            }
        }
    }

    /// Admit the peer: evict any previous registration, register locally,
    /// allocate a media session, then register with the directory and the
    /// media node, rolling back on failure.
    async fn handle_join(&self, request: AdmitRequest) -> Result<JoinResponse, ScError> {
        let room_id = &self.key.room_id;
        let peer_id = &self.key.peer_id;

        let directory = request.directory;

        self.evict_existing(&directory).await;

        let peer = Arc::new(LocalPeer::new(
            room_id.clone(),
            peer_id.clone(),
            request.connection,
        ));
        if let Some(displaced) = self.ctx.registry.add(Arc::clone(&peer)).await {
            displaced.close();
        }

        let key = SessionKey::new(peer_id.clone(), room_id.clone(), SessionId::generate());

        let media = match self
            .ctx
            .resolver
            .resolve(NodeKind::Media, ResolveScope::Allocate(key.clone()))
            .await
        {
            Ok(node) => node,
            Err(e) => {
                self.ctx.registry.remove_if_same(&peer).await;
                return Err(e);
            }
        };

        let roster = match directory
            .peer_join(peer_id, room_id, &key.session_id, request.info.clone())
            .await
        {
            Ok(roster) => roster,
            Err(e) => {
                self.rollback_join(&peer, &key, None).await;
                return Err(e.into());
            }
        };

        let answer = match MediaClient::new(media.rpc)
            .join(
                &key,
                roster.directory_session.clone(),
                request.jsep,
                request.info,
            )
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                self.rollback_join(&peer, &key, Some(&directory)).await;
                return Err(e.into());
            }
        };

        let stream_count = request.streams.len();
        for stream_id in request.streams {
            directory.stream_add(peer_id, room_id, &key.session_id, stream_id);
        }

        info!(
            target: "sc.actor.peer",
            room_id = %room_id,
            peer_id = %peer_id,
            session_id = %key.session_id,
            media_node = %media.info.id,
            roster_peers = roster.peers.len(),
            streams = stream_count,
            "Peer joined"
        );

        Ok(JoinResponse {
            peers: roster.peers,
            streams: roster.streams,
            session_id: key.session_id,
            jsep: answer.jsep,
            info: answer.info,
        })
    }

    /// Drop a previous registration of the same peer in the same room.
    ///
    /// The media node is not told, so the evicted registration's sessions stay
    /// open and keep their bindings, which still count toward node load. They
    /// are torn down by a later leave only if the directory lists them; a
    /// session the directory has forgotten keeps its binding until restart.
    async fn evict_existing(&self, directory: &DirectoryClient) {
        let room_id = &self.key.room_id;
        let peer_id = &self.key.peer_id;

        let Some(existing) = self.ctx.registry.get(room_id, peer_id).await else {
            return;
        };

        info!(
            target: "sc.actor.peer",
            room_id = %room_id,
            peer_id = %peer_id,
            "Peer already registered, evicting previous registration"
        );

        if let Err(e) = directory.peer_leave(peer_id, room_id).await {
            warn!(
                target: "sc.actor.peer",
                room_id = %room_id,
                peer_id = %peer_id,
                error = %e,
                "Directory peer-leave failed during eviction"
            );
            metrics::record_cleanup_failure("evict_peer_leave");
        }

        self.ctx.registry.remove_if_same(&existing).await;
        existing.close();
    }

    /// Undo a partially applied join. Every step is best effort.
    async fn rollback_join(
        &self,
        peer: &Arc<LocalPeer>,
        key: &SessionKey,
        directory: Option<&DirectoryClient>,
    ) {
        self.ctx.registry.remove_if_same(peer).await;
        self.ctx.resolver.release(key).await;

        if let Some(directory) = directory {
            if let Err(e) = directory.peer_leave(&key.peer_id, &key.room_id).await {
                warn!(
                    target: "sc.actor.peer",
                    room_id = %key.room_id,
                    peer_id = %key.peer_id,
                    error = %e,
                    "Directory peer-leave failed during join rollback"
                );
                metrics::record_cleanup_failure("rollback_peer_leave");
            }
        }

        warn!(
            target: "sc.actor.peer",
            room_id = %key.room_id,
            peer_id = %key.peer_id,
            session_id = %key.session_id,
            "Join rolled back"
        );
    }

    /// Remove the peer and tear down its sessions. Never fails: every remote
    /// step is attempted and failures are logged.
    async fn handle_leave(&self, session_id: Option<SessionId>) {
        let room_id = &self.key.room_id;
        let peer_id = &self.key.peer_id;

        if !self.ctx.registry.has_room(room_id).await {
            debug!(
                target: "sc.actor.peer",
                room_id = %room_id,
                peer_id = %peer_id,
                "Leave for a room with no local peers, ignoring"
            );
            return;
        }

        self.ctx.registry.remove(room_id, peer_id).await;

        let directory = match self
            .ctx
            .resolver
            .resolve(NodeKind::Directory, ResolveScope::Cluster)
            .await
        {
            Ok(node) => Some(DirectoryClient::new(node.rpc)),
            Err(e) => {
                warn!(
                    target: "sc.actor.peer",
                    room_id = %room_id,
                    peer_id = %peer_id,
                    error = %e,
                    "No directory node during leave"
                );
                metrics::record_cleanup_failure("resolve_directory");
                None
            }
        };

        if let Some(directory) = &directory {
            if let Err(e) = directory.peer_leave(peer_id, room_id).await {
                warn!(
                    target: "sc.actor.peer",
                    room_id = %room_id,
                    peer_id = %peer_id,
                    error = %e,
                    "Directory peer-leave failed"
                );
                metrics::record_cleanup_failure("leave_peer_leave");
            }
        }

        let sessions = match (session_id, &directory) {
            (Some(session_id), _) => vec![session_id],
            (None, Some(directory)) => match directory.list_sessions(peer_id, room_id).await {
                Ok(sessions) => sessions,
                Err(e) => {
                    warn!(
                        target: "sc.actor.peer",
                        room_id = %room_id,
                        peer_id = %peer_id,
                        error = %e,
                        "Could not list peer sessions"
                    );
                    metrics::record_cleanup_failure("list_sessions");
                    Vec::new()
                }
            },
            (None, None) => Vec::new(),
        };

        let session_count = sessions.len();
        for session_id in sessions {
            let key = SessionKey::new(peer_id.clone(), room_id.clone(), session_id);
            self.teardown_session(&key).await;
        }

        info!(
            target: "sc.actor.peer",
            room_id = %room_id,
            peer_id = %peer_id,
            sessions = session_count,
            "Peer left"
        );
    }

    async fn teardown_session(&self, key: &SessionKey) {
        match self
            .ctx
            .resolver
            .resolve(NodeKind::Media, ResolveScope::Bound(key.clone()))
            .await
        {
            Ok(node) => {
                if let Err(e) = MediaClient::new(node.rpc).leave(key).await {
                    warn!(
                        target: "sc.actor.peer",
                        room_id = %key.room_id,
                        peer_id = %key.peer_id,
                        session_id = %key.session_id,
                        media_node = %node.info.id,
                        error = %e,
                        "Media leave failed"
                    );
                    metrics::record_cleanup_failure("media_leave");
                }
            }
            Err(e) => {
                warn!(
                    target: "sc.actor.peer",
                    room_id = %key.room_id,
                    peer_id = %key.peer_id,
                    session_id = %key.session_id,
                    error = %e,
                    "Could not resolve media node for session"
                );
                metrics::record_cleanup_failure("resolve_session");
            }
        }

        self.ctx.resolver.release(key).await;
    }
}
