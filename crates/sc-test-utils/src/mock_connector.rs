//! Mock node connector.
//!
//! Hands out registered mock nodes by node ID. Nodes that were never
//! registered get a handle that fails every request as unreachable.

use async_trait::async_trait;
use common::types::NodeId;
use sc_service::cluster::{NodeConnector, NodeInfo};
use sc_service::rpc::{NodeRequest, NodeRpc, RpcError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// [`NodeConnector`] over in-process mocks.
#[derive(Default)]
pub struct MockConnector {
    nodes: Mutex<HashMap<NodeId, Arc<dyn NodeRpc>>>,
    connect_count: AtomicUsize,
}

impl MockConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the RPC handle returned for `id`.
    pub fn register(&self, id: &str, rpc: Arc<dyn NodeRpc>) {
        self.nodes.lock().unwrap().insert(id.into(), rpc);
    }

    /// Number of times a handle was created.
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }
}

impl NodeConnector for MockConnector {
    fn connect(&self, node: &NodeInfo) -> Arc<dyn NodeRpc> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.nodes
            .lock()
            .unwrap()
            .get(&node.id)
            .cloned()
            .unwrap_or_else(|| Arc::new(UnreachableNode))
    }
}

/// Handle for a node nobody answers for.
#[derive(Debug, Default)]
pub struct UnreachableNode;

#[async_trait]
impl NodeRpc for UnreachableNode {
    async fn request(&self, _request: NodeRequest) -> Result<Value, RpcError> {
        Err(RpcError::Unreachable("no such node".to_string()))
    }

    fn notify(&self, _request: NodeRequest) {}
}
