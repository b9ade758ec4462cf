//! Live node membership.
//!
//! Seeded from configuration at startup; the discovery feed keeps it current
//! through [`NodeTable::upsert`] and [`NodeTable::remove`].

use super::{NodeInfo, NodeKind};
use common::types::NodeId;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Live cluster nodes by ID.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: RwLock<HashMap<NodeId, NodeInfo>>,
}

impl NodeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from an initial set of nodes.
    #[must_use]
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeInfo>) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Add or replace a node.
    pub async fn upsert(&self, node: NodeInfo) {
        info!(
            target: "sc.cluster.table",
            node_id = %node.id,
            kind = %node.kind,
            "Node joined"
        );
        self.nodes.write().await.insert(node.id.clone(), node);
    }

    /// Remove a node that is no longer live.
    pub async fn remove(&self, id: &NodeId) -> Option<NodeInfo> {
        let removed = self.nodes.write().await.remove(id);
        if let Some(node) = &removed {
            info!(
                target: "sc.cluster.table",
                node_id = %node.id,
                kind = %node.kind,
                "Node left"
            );
        }
        removed
    }

    pub async fn get(&self, id: &NodeId) -> Option<NodeInfo> {
        self.nodes.read().await.get(id).cloned()
    }

    /// Live nodes of `kind`, ordered by node ID.
    pub async fn nodes_of(&self, kind: NodeKind) -> Vec<NodeInfo> {
        let mut nodes: Vec<NodeInfo> = self
            .nodes
            .read()
            .await
            .values()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    pub async fn has_kind(&self, kind: NodeKind) -> bool {
        self.nodes.read().await.values().any(|n| n.kind == kind)
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn media(id: &str) -> NodeInfo {
        NodeInfo::new(NodeId::from(id), NodeKind::Media)
    }

    #[tokio::test]
    async fn test_nodes_of_filters_by_kind_and_sorts() {
        let table = NodeTable::from_nodes([
            media("sfu-b"),
            NodeInfo::new(NodeId::from("islb-1"), NodeKind::Directory),
            media("sfu-a"),
        ]);

        let ids: Vec<String> = table
            .nodes_of(NodeKind::Media)
            .await
            .into_iter()
            .map(|n| n.id.to_string())
            .collect();
        assert_eq!(ids, vec!["sfu-a", "sfu-b"]);
        assert!(table.has_kind(NodeKind::Directory).await);
        assert!(!table.has_kind(NodeKind::Inspection).await);
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let table = NodeTable::new();
        assert!(table.is_empty().await);

        table.upsert(media("sfu-1")).await;
        assert_eq!(table.len().await, 1);
        assert_eq!(
            table.get(&NodeId::from("sfu-1")).await.unwrap().rpc_subject,
            "rpc-sfu-1"
        );

        assert!(table.remove(&NodeId::from("sfu-1")).await.is_some());
        assert!(table.remove(&NodeId::from("sfu-1")).await.is_none());
        assert!(!table.has_kind(NodeKind::Media).await);
    }
}
