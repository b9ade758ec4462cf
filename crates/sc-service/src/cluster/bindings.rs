//! Session-to-media-node bindings.
//!
//! A binding is written once, when the session's media node is allocated,
//! and only ever removed afterwards. Nothing overwrites an existing binding.

use super::SessionKey;
use common::types::{NodeId, SessionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The media node a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub key: SessionKey,
    pub node_id: NodeId,
}

/// Concurrent `SessionId -> SessionBinding` map.
#[derive(Debug, Default)]
pub struct SessionBindings {
    bindings: RwLock<HashMap<SessionId, SessionBinding>>,
}

impl SessionBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<SessionBinding> {
        self.bindings.read().await.get(session_id).cloned()
    }

    /// Bind `key` to `node_id` unless the session is already bound.
    ///
    /// Returns the binding in effect afterwards, which is the existing one if
    /// the session was already bound.
    pub async fn bind(&self, key: SessionKey, node_id: NodeId) -> SessionBinding {
        let mut bindings = self.bindings.write().await;
        bindings
            .entry(key.session_id.clone())
            .or_insert(SessionBinding { key, node_id })
            .clone()
    }

    /// Remove the binding for `key`, only if it is owned by the same peer and room.
    pub async fn release(&self, key: &SessionKey) -> Option<SessionBinding> {
        let mut bindings = self.bindings.write().await;
        match bindings.get(&key.session_id) {
            Some(existing) if existing.key == *key => bindings.remove(&key.session_id),
            _ => None,
        }
    }

    /// Number of bound sessions per media node.
    pub async fn load_by_node(&self) -> HashMap<NodeId, usize> {
        let mut load = HashMap::new();
        for binding in self.bindings.read().await.values() {
            *load.entry(binding.node_id.clone()).or_insert(0) += 1;
        }
        load
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn key(peer: &str, session: &str) -> SessionKey {
        SessionKey::new(peer.into(), "r1".into(), session.into())
    }

    #[tokio::test]
    async fn test_bind_never_overwrites() {
        let bindings = SessionBindings::new();

        let first = bindings.bind(key("u1", "s-1"), NodeId::from("sfu-1")).await;
        let second = bindings.bind(key("u1", "s-1"), NodeId::from("sfu-2")).await;

        assert_eq!(first.node_id, NodeId::from("sfu-1"));
        assert_eq!(second.node_id, NodeId::from("sfu-1"));
        assert_eq!(bindings.len().await, 1);
    }

    #[tokio::test]
    async fn test_release_requires_owner() {
        let bindings = SessionBindings::new();
        bindings.bind(key("u1", "s-1"), NodeId::from("sfu-1")).await;

        assert!(bindings.release(&key("u2", "s-1")).await.is_none());
        assert!(bindings.get(&"s-1".into()).await.is_some());

        assert!(bindings.release(&key("u1", "s-1")).await.is_some());
        assert!(bindings.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_by_node() {
        let bindings = SessionBindings::new();
        bindings.bind(key("u1", "s-1"), NodeId::from("sfu-1")).await;
        bindings.bind(key("u2", "s-2"), NodeId::from("sfu-1")).await;
        bindings.bind(key("u3", "s-3"), NodeId::from("sfu-2")).await;

        let load = bindings.load_by_node().await;
        assert_eq!(load.get(&NodeId::from("sfu-1")), Some(&2));
        assert_eq!(load.get(&NodeId::from("sfu-2")), Some(&1));
    }
}
