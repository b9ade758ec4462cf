//! Cluster membership and node resolution.
//!
//! Nodes are never hardcoded: every directory or media node the coordinator
//! talks to is obtained by resolving a [`NodeKind`] (and, for media nodes, a
//! session scope) against the live [`NodeTable`].

mod bindings;
mod resolver;
mod table;

pub use bindings::{SessionBinding, SessionBindings};
pub use resolver::ClusterResolver;
pub use table::NodeTable;

use crate::errors::ScError;
use crate::rpc::NodeRpc;
use async_trait::async_trait;
use common::types::{NodeId, PeerId, RoomId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Cluster-wide directory of rooms, peers, sessions and streams.
    Directory,
    /// Media-forwarding node owning individual sessions.
    Media,
    /// Session coordinator (this service).
    Coordinator,
    /// Debug/inspection node.
    Inspection,
}

impl NodeKind {
    /// Returns the node kind as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::Media => "media",
            NodeKind::Coordinator => "coordinator",
            NodeKind::Inspection => "inspection",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live cluster node as published by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Bus subject the node answers RPCs on.
    pub rpc_subject: String,
}

impl NodeInfo {
    /// Node on the conventional `rpc-<node id>` subject.
    #[must_use]
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        let rpc_subject = format!("rpc-{id}");
        Self {
            id,
            kind,
            rpc_subject,
        }
    }
}

/// The (peer, room, session) scope of a media resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub peer_id: PeerId,
    pub room_id: RoomId,
    pub session_id: SessionId,
}

impl SessionKey {
    #[must_use]
    pub fn new(peer_id: PeerId, room_id: RoomId, session_id: SessionId) -> Self {
        Self {
            peer_id,
            room_id,
            session_id,
        }
    }
}

/// What a resolution is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveScope {
    /// Any live instance of the kind.
    Cluster,
    /// Allocate a node for a new session (stable if already allocated).
    Allocate(SessionKey),
    /// The node an existing session is bound to. Never allocates.
    Bound(SessionKey),
}

/// A resolved node together with the handle used to reach it.
#[derive(Clone)]
pub struct ResolvedNode {
    pub info: NodeInfo,
    pub rpc: Arc<dyn NodeRpc>,
}

impl fmt::Debug for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNode")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Resolves node kinds (and session scopes) to live nodes.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    /// Resolve a live node of `kind` for `scope`.
    ///
    /// # Errors
    ///
    /// Returns `ScError::Resolution` when no live node matches.
    async fn resolve(&self, kind: NodeKind, scope: ResolveScope) -> Result<ResolvedNode, ScError>;

    /// Drop the binding of a session that has been torn down.
    ///
    /// Returns `true` if a binding owned by `key` was removed.
    async fn release(&self, key: &SessionKey) -> bool;
}

/// Produces an RPC handle for a node.
pub trait NodeConnector: Send + Sync {
    fn connect(&self, node: &NodeInfo) -> Arc<dyn NodeRpc>;
}
