//! `PeerActors` - keyed supervisor for peer actors.
//!
//! Looks up or spawns the actor for a (room, peer) key and hands it the
//! message. An actor that exited while idle is replaced by a fresh one that
//! first waits for the old one to finish, so ordering per key holds across
//! the replacement.

use super::messages::{AdmitRequest, PeerKey, PeerMessage};
use super::metrics::ActorMetrics;
use super::peer::{PeerActor, PeerActorHandle};
use crate::coordinator::{CoordinatorContext, JoinResponse};
use crate::errors::ScError;
use common::types::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Supervisor owning one `PeerActor` per active (room, peer) key.
pub struct PeerActors {
    ctx: CoordinatorContext,
    actors: Mutex<HashMap<PeerKey, PeerActorHandle>>,
    cancel_token: CancellationToken,
    idle_timeout: Duration,
    metrics: Arc<ActorMetrics>,
}

impl PeerActors {
    /// Create the supervisor. Actors are children of `cancel_token`.
    #[must_use]
    pub fn new(
        ctx: CoordinatorContext,
        cancel_token: CancellationToken,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            ctx,
            actors: Mutex::new(HashMap::new()),
            cancel_token,
            idle_timeout,
            metrics: ActorMetrics::new(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ActorMetrics> {
        &self.metrics
    }

    /// Run an admission on the key's actor.
    pub async fn join(&self, key: PeerKey, request: AdmitRequest) -> Result<JoinResponse, ScError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            &key,
            PeerMessage::Join {
                request,
                respond_to: tx,
            },
        )
        .await?;

        rx.await
            .map_err(|e| ScError::Internal(format!("response receive failed: {e}")))?
    }

    /// Run a leave on the key's actor.
    pub async fn leave(&self, key: PeerKey, session_id: Option<SessionId>) -> Result<(), ScError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            &key,
            PeerMessage::Leave {
                session_id,
                respond_to: tx,
            },
        )
        .await?;

        rx.await
            .map_err(|e| ScError::Internal(format!("response receive failed: {e}")))
    }

    /// Number of actors currently accepting messages.
    pub async fn active_count(&self) -> usize {
        self.actors
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    /// Cancel every actor and wait for them to exit, up to `deadline`.
    pub async fn shutdown(&self, deadline: Duration) {
        self.cancel_token.cancel();

        let finished: Vec<CancellationToken> = self
            .actors
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle.finished())
            .collect();
        let count = finished.len();

        let wait_all = async {
            for token in finished {
                token.cancelled().await;
            }
        };
        if tokio::time::timeout(deadline, wait_all).await.is_err() {
            warn!(
                target: "sc.actor.supervisor",
                actors = count,
                "Peer actors did not stop before the shutdown deadline"
            );
        } else {
            info!(
                target: "sc.actor.supervisor",
                actors = count,
                "Peer actors stopped"
            );
        }
    }

    async fn dispatch(&self, key: &PeerKey, message: PeerMessage) -> Result<(), ScError> {
        if self.cancel_token.is_cancelled() {
            return Err(ScError::Internal(
                "peer actors are shutting down".to_string(),
            ));
        }

        let handle = self.handle_for(key).await;
        let Err(message) = handle.deliver(message).await else {
            return Ok(());
        };

        // The actor retired between lookup and delivery.
        debug!(
            target: "sc.actor.supervisor",
            room_id = %key.room_id,
            peer_id = %key.peer_id,
            "Peer actor retired during delivery, respawning"
        );
        let handle = self.handle_for(key).await;
        handle.deliver(message).await.map_err(|_| {
            ScError::Internal("channel send failed: peer actor unavailable".to_string())
        })
    }

    /// Get the live actor for `key`, spawning one if needed.
    async fn handle_for(&self, key: &PeerKey) -> PeerActorHandle {
        let mut actors = self.actors.lock().await;

        if let Some(handle) = actors.get(key) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let predecessor = actors.remove(key).map(|handle| handle.finished());
        actors.retain(|_, handle| !handle.is_closed());

        let (handle, _task) = PeerActor::spawn(
            key.clone(),
            self.ctx.clone(),
            self.cancel_token.child_token(),
            self.idle_timeout,
            predecessor,
            Arc::clone(&self.metrics),
        );
        actors.insert(key.clone(), handle.clone());
        handle
    }
}
