//! Cluster node resolver.
//!
//! Directory (and other singleton-kind) lookups return the live node with the
//! lowest ID. Media lookups are session-scoped: `Allocate` picks the
//! least-loaded live media node and records the binding, `Bound` returns the
//! recorded node and never allocates.

use super::{
    NodeConnector, NodeInfo, NodeKind, NodeResolver, NodeTable, ResolveScope, ResolvedNode,
    SessionBindings, SessionKey,
};
use crate::errors::ScError;
use crate::rpc::NodeRpc;
use async_trait::async_trait;
use common::types::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Resolver over the live node table and the session binding cache.
pub struct ClusterResolver {
    table: Arc<NodeTable>,
    bindings: Arc<SessionBindings>,
    connector: Arc<dyn NodeConnector>,
    /// Cached RPC handles by node.
    handles: RwLock<HashMap<NodeId, Arc<dyn NodeRpc>>>,
}

impl ClusterResolver {
    #[must_use]
    pub fn new(table: Arc<NodeTable>, connector: Arc<dyn NodeConnector>) -> Self {
        Self {
            table,
            bindings: Arc::new(SessionBindings::new()),
            connector,
            handles: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn table(&self) -> &Arc<NodeTable> {
        &self.table
    }

    #[must_use]
    pub fn bindings(&self) -> &Arc<SessionBindings> {
        &self.bindings
    }

    /// Get or create the RPC handle for a node.
    async fn handle_for(&self, node: &NodeInfo) -> Arc<dyn NodeRpc> {
        {
            let handles = self.handles.read().await;
            if let Some(rpc) = handles.get(&node.id) {
                return Arc::clone(rpc);
            }
        }

        let mut handles = self.handles.write().await;
        Arc::clone(
            handles
                .entry(node.id.clone())
                .or_insert_with(|| self.connector.connect(node)),
        )
    }

    async fn resolved(&self, info: NodeInfo) -> ResolvedNode {
        let rpc = self.handle_for(&info).await;
        ResolvedNode { info, rpc }
    }

    async fn first_of_kind(&self, kind: NodeKind) -> Result<ResolvedNode, ScError> {
        let node = self
            .table
            .nodes_of(kind)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| ScError::Resolution {
                kind,
                reason: format!("no live {kind} node"),
            })?;
        Ok(self.resolved(node).await)
    }

    async fn allocate_media(&self, key: SessionKey) -> Result<ResolvedNode, ScError> {
        if let Some(existing) = self.bindings.get(&key.session_id).await {
            if existing.key != key {
                return Err(ScError::Resolution {
                    kind: NodeKind::Media,
                    reason: format!("session {} is owned by another peer", key.session_id),
                });
            }
            return self.live_bound_node(&existing.node_id).await;
        }

        let candidates = self.table.nodes_of(NodeKind::Media).await;
        let load = self.bindings.load_by_node().await;
        let chosen = least_loaded(&candidates, &load)
            .cloned()
            .ok_or_else(|| ScError::Resolution {
                kind: NodeKind::Media,
                reason: "no live media node".to_string(),
            })?;

        let binding = self.bindings.bind(key, chosen.id.clone()).await;
        debug!(
            target: "sc.cluster.resolver",
            session_id = %binding.key.session_id,
            node_id = %binding.node_id,
            candidates = candidates.len(),
            "Media node allocated"
        );

        if binding.node_id == chosen.id {
            Ok(self.resolved(chosen).await)
        } else {
            self.live_bound_node(&binding.node_id).await
        }
    }

    async fn bound_media(&self, key: &SessionKey) -> Result<ResolvedNode, ScError> {
        let binding = self
            .bindings
            .get(&key.session_id)
            .await
            .filter(|b| b.key == *key)
            .ok_or_else(|| ScError::Resolution {
                kind: NodeKind::Media,
                reason: format!("session {} is not bound", key.session_id),
            })?;
        self.live_bound_node(&binding.node_id).await
    }

    async fn live_bound_node(&self, node_id: &NodeId) -> Result<ResolvedNode, ScError> {
        match self.table.get(node_id).await {
            Some(node) => Ok(self.resolved(node).await),
            None => {
                warn!(
                    target: "sc.cluster.resolver",
                    node_id = %node_id,
                    "Bound media node is no longer live"
                );
                Err(ScError::Resolution {
                    kind: NodeKind::Media,
                    reason: format!("bound media node {node_id} is no longer live"),
                })
            }
        }
    }
}

#[async_trait]
impl NodeResolver for ClusterResolver {
    #[instrument(skip_all, name = "sc.cluster.resolve", fields(kind = %kind))]
    async fn resolve(&self, kind: NodeKind, scope: ResolveScope) -> Result<ResolvedNode, ScError> {
        match (kind, scope) {
            (
                NodeKind::Directory | NodeKind::Coordinator | NodeKind::Inspection,
                ResolveScope::Cluster,
            ) => self.first_of_kind(kind).await,
            (NodeKind::Media, ResolveScope::Allocate(key)) => self.allocate_media(key).await,
            (NodeKind::Media, ResolveScope::Bound(key)) => self.bound_media(&key).await,
            (NodeKind::Media, ResolveScope::Cluster) => Err(ScError::Resolution {
                kind,
                reason: "media resolution requires a session scope".to_string(),
            }),
            (
                NodeKind::Directory | NodeKind::Coordinator | NodeKind::Inspection,
                ResolveScope::Allocate(_) | ResolveScope::Bound(_),
            ) => Err(ScError::Resolution {
                kind,
                reason: format!("{kind} nodes are not session-scoped"),
            }),
        }
    }

    async fn release(&self, key: &SessionKey) -> bool {
        let released = self.bindings.release(key).await.is_some();
        if released {
            debug!(
                target: "sc.cluster.resolver",
                session_id = %key.session_id,
                "Session binding released"
            );
        }
        released
    }
}

/// Pick the candidate with the fewest bound sessions; ties go to the lowest ID.
fn least_loaded<'a>(
    candidates: &'a [NodeInfo],
    load: &HashMap<NodeId, usize>,
) -> Option<&'a NodeInfo> {
    candidates
        .iter()
        .min_by(|a, b| {
            let load_a = load.get(&a.id).copied().unwrap_or(0);
            let load_b = load.get(&b.id).copied().unwrap_or(0);
            load_a.cmp(&load_b).then_with(|| a.id.cmp(&b.id))
        })
}
