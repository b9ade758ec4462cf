//! Local peer registry.
//!
//! In-process map from (room, peer) to the peer's local connection handle.
//! A room exists here only while at least one of its peers is registered on
//! this node.

use crate::observability::metrics;
use common::types::{PeerId, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A peer registered on this node.
#[derive(Debug)]
pub struct LocalPeer {
    room_id: RoomId,
    peer_id: PeerId,
    /// Cancelled when the local connection is severed.
    connection: CancellationToken,
}

impl LocalPeer {
    #[must_use]
    pub fn new(room_id: RoomId, peer_id: PeerId, connection: CancellationToken) -> Self {
        Self {
            room_id,
            peer_id,
            connection,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    #[must_use]
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Sever the local connection.
    pub fn close(&self) {
        self.connection.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.is_cancelled()
    }

    /// Resolves once the local connection has been severed.
    pub async fn closed(&self) {
        self.connection.cancelled().await;
    }
}

/// Peers registered on this node, by room.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    rooms: RwLock<HashMap<RoomId, HashMap<PeerId, Arc<LocalPeer>>>>,
}

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, returning the one it displaced (if any).
    ///
    /// The displaced handle is not closed here.
    pub async fn add(&self, peer: Arc<LocalPeer>) -> Option<Arc<LocalPeer>> {
        let mut rooms = self.rooms.write().await;
        let displaced = rooms
            .entry(peer.room_id.clone())
            .or_default()
            .insert(peer.peer_id.clone(), Arc::clone(&peer));
        debug!(
            target: "sc.registry",
            room_id = %peer.room_id,
            peer_id = %peer.peer_id,
            displaced = displaced.is_some(),
            "Peer registered"
        );
        publish_gauges(&rooms);
        displaced
    }

    pub async fn get(&self, room_id: &RoomId, peer_id: &PeerId) -> Option<Arc<LocalPeer>> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .and_then(|peers| peers.get(peer_id))
            .cloned()
    }

    /// Remove a peer. Empty rooms are dropped.
    pub async fn remove(&self, room_id: &RoomId, peer_id: &PeerId) -> Option<Arc<LocalPeer>> {
        let mut rooms = self.rooms.write().await;
        let removed = remove_locked(&mut rooms, room_id, peer_id, |_| true);
        publish_gauges(&rooms);
        removed
    }

    /// Remove a peer only if the registered handle is `peer` itself.
    pub async fn remove_if_same(&self, peer: &Arc<LocalPeer>) -> bool {
        let mut rooms = self.rooms.write().await;
        let removed = remove_locked(&mut rooms, &peer.room_id, &peer.peer_id, |current| {
            Arc::ptr_eq(current, peer)
        });
        publish_gauges(&rooms);
        removed.is_some()
    }

    pub async fn has_room(&self, room_id: &RoomId) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    /// Peers registered in a room, in no particular order.
    pub async fn peers_in(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|peers| peers.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn peer_count(&self) -> usize {
        self.rooms.read().await.values().map(HashMap::len).sum()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn remove_locked(
    rooms: &mut HashMap<RoomId, HashMap<PeerId, Arc<LocalPeer>>>,
    room_id: &RoomId,
    peer_id: &PeerId,
    matches: impl FnOnce(&Arc<LocalPeer>) -> bool,
) -> Option<Arc<LocalPeer>> {
    let peers = rooms.get_mut(room_id)?;
    if !peers.get(peer_id).is_some_and(matches) {
        return None;
    }
    let removed = peers.remove(peer_id);
    if peers.is_empty() {
        rooms.remove(room_id);
    }
    if removed.is_some() {
        debug!(
            target: "sc.registry",
            room_id = %room_id,
            peer_id = %peer_id,
            "Peer removed"
        );
    }
    removed
}

fn publish_gauges(rooms: &HashMap<RoomId, HashMap<PeerId, Arc<LocalPeer>>>) {
    let peers: usize = rooms.values().map(HashMap::len).sum();
    metrics::set_peers_active(peers);
    metrics::set_rooms_active(rooms.len());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn peer(room: &str, id: &str) -> Arc<LocalPeer> {
        Arc::new(LocalPeer::new(
            room.into(),
            id.into(),
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_add_returns_displaced_peer_without_closing_it() {
        let registry = PeerRegistry::new();
        let first = peer("r1", "u1");
        let second = peer("r1", "u1");

        assert!(registry.add(Arc::clone(&first)).await.is_none());
        let displaced = registry.add(Arc::clone(&second)).await.unwrap();

        assert!(Arc::ptr_eq(&displaced, &first));
        assert!(!displaced.is_closed());
        assert_eq!(registry.peer_count().await, 1);
        let current = registry.get(&"r1".into(), &"u1".into()).await.unwrap();
        assert!(Arc::ptr_eq(&current, &second));
    }

    #[tokio::test]
    async fn test_room_exists_only_while_occupied() {
        let registry = PeerRegistry::new();
        registry.add(peer("r1", "u1")).await;
        registry.add(peer("r1", "u2")).await;
        assert!(registry.has_room(&"r1".into()).await);
        assert_eq!(registry.room_count().await, 1);

        registry.remove(&"r1".into(), &"u1".into()).await.unwrap();
        assert!(registry.has_room(&"r1".into()).await);
        assert_eq!(registry.peers_in(&"r1".into()).await, vec![PeerId::from("u2")]);

        registry.remove(&"r1".into(), &"u2".into()).await.unwrap();
        assert!(!registry.has_room(&"r1".into()).await);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_if_same_ignores_replaced_handle() {
        let registry = PeerRegistry::new();
        let stale = peer("r1", "u1");
        let current = peer("r1", "u1");
        registry.add(Arc::clone(&stale)).await;
        registry.add(Arc::clone(&current)).await;

        assert!(!registry.remove_if_same(&stale).await);
        assert_eq!(registry.peer_count().await, 1);

        assert!(registry.remove_if_same(&current).await);
        assert_eq!(registry.peer_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_severs_connection() {
        let p = peer("r1", "u1");
        assert!(!p.is_closed());
        p.close();
        assert!(p.is_closed());
        p.closed().await;
    }
}
