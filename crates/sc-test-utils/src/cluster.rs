//! In-process cluster harness.
//!
//! `TestCluster` wires mock nodes into a real [`NodeTable`],
//! [`ClusterResolver`], [`PeerRegistry`] and [`SessionCoordinator`]. Only
//! the nodes themselves are doubles; resolution, bindings and peer actors are
//! the production code.

use crate::fixtures::{join_request, TestOffer};
use crate::mock_connector::MockConnector;
use crate::mock_directory::MockDirectory;
use crate::mock_media::MockMediaNode;
use axum::Router;
use common::types::{NodeId, PeerId, SessionId};
use sc_service::cluster::{
    ClusterResolver, NodeConnector, NodeInfo, NodeKind, NodeResolver, NodeTable,
};
use sc_service::coordinator::{CoordinatorContext, JoinResponse, SessionCoordinator};
use sc_service::errors::ScError;
use sc_service::registry::PeerRegistry;
use sc_service::routes::{build_routes, AppState};
use sc_service::rpc::NodeRpc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Idle timeout used unless a test overrides it.
pub const DEFAULT_TEST_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// A coordinator running against mock directory and media nodes.
pub struct TestCluster {
    pub directory: Arc<MockDirectory>,
    pub table: Arc<NodeTable>,
    pub connector: Arc<MockConnector>,
    pub resolver: Arc<ClusterResolver>,
    pub registry: Arc<PeerRegistry>,
    pub coordinator: Arc<SessionCoordinator>,
    pub cancel: CancellationToken,
    media: Vec<Arc<MockMediaNode>>,
}

impl TestCluster {
    #[must_use]
    pub fn builder() -> TestClusterBuilder {
        TestClusterBuilder::default()
    }

    /// The mock media node registered as `id`.
    ///
    /// # Panics
    ///
    /// Panics if no media node with that ID was added.
    #[must_use]
    pub fn media(&self, id: &str) -> Arc<MockMediaNode> {
        self.media
            .iter()
            .find(|m| m.id().as_str() == id)
            .cloned()
            .unwrap_or_else(|| panic!("no mock media node {id}"))
    }

    /// The media node that currently holds `session_id`, if any.
    #[must_use]
    pub fn media_holding(&self, session_id: &SessionId) -> Option<Arc<MockMediaNode>> {
        self.media
            .iter()
            .find(|m| m.has_session(session_id))
            .cloned()
    }

    /// Join `peer` into `room` with a fresh connection handle.
    pub async fn join(
        &self,
        peer: &str,
        room: &str,
        offer: TestOffer,
    ) -> Result<JoinResponse, ScError> {
        self.coordinator
            .join(
                PeerId::from(peer),
                join_request(room, offer),
                CancellationToken::new(),
            )
            .await
    }

    /// The signaling API over this cluster's coordinator.
    #[must_use]
    pub fn app(&self) -> Router {
        build_routes(Arc::new(AppState {
            coordinator: Arc::clone(&self.coordinator),
        }))
    }

    /// Take a node out of the live table, as discovery would on node loss.
    pub async fn kill_node(&self, id: &str) {
        self.table.remove(&NodeId::from(id)).await;
    }
}

/// Builder for [`TestCluster`].
#[derive(Default)]
pub struct TestClusterBuilder {
    directory: Option<(String, MockDirectory)>,
    media: Vec<MockMediaNode>,
    idle_timeout: Option<Duration>,
}

impl TestClusterBuilder {
    /// Add a directory node with default behavior.
    #[must_use]
    pub fn directory(self, id: &str) -> Self {
        self.with_directory(id, MockDirectory::new())
    }

    /// Add a preconfigured directory node.
    #[must_use]
    pub fn with_directory(mut self, id: &str, directory: MockDirectory) -> Self {
        self.directory = Some((id.to_string(), directory));
        self
    }

    /// Add a media node with default behavior.
    #[must_use]
    pub fn media(self, id: &str) -> Self {
        self.with_media(MockMediaNode::new(id))
    }

    /// Add a preconfigured media node.
    #[must_use]
    pub fn with_media(mut self, media: MockMediaNode) -> Self {
        self.media.push(media);
        self
    }

    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn build(self) -> TestCluster {
        let connector = Arc::new(MockConnector::new());
        let mut seeds = Vec::new();

        // Without a directory node the mock still exists, it is just not live.
        let directory = match self.directory {
            Some((id, directory)) => {
                let directory = Arc::new(directory);
                let rpc: Arc<dyn NodeRpc> = directory.clone();
                connector.register(&id, rpc);
                seeds.push(NodeInfo::new(NodeId::from(id.as_str()), NodeKind::Directory));
                directory
            }
            None => Arc::new(MockDirectory::new()),
        };

        let media: Vec<Arc<MockMediaNode>> = self.media.into_iter().map(Arc::new).collect();
        for node in &media {
            let rpc: Arc<dyn NodeRpc> = node.clone();
            connector.register(node.id().as_str(), rpc);
            seeds.push(NodeInfo::new(node.id().clone(), NodeKind::Media));
        }

        let table = Arc::new(NodeTable::from_nodes(seeds));
        let node_connector: Arc<dyn NodeConnector> = connector.clone();
        let resolver = Arc::new(ClusterResolver::new(Arc::clone(&table), node_connector));
        let node_resolver: Arc<dyn NodeResolver> = resolver.clone();
        let registry = Arc::new(PeerRegistry::new());
        let cancel = CancellationToken::new();
        let coordinator = Arc::new(SessionCoordinator::new(
            CoordinatorContext::new(node_resolver, Arc::clone(&registry)),
            self.idle_timeout.unwrap_or(DEFAULT_TEST_IDLE_TIMEOUT),
            cancel.child_token(),
        ));

        TestCluster {
            directory,
            table,
            connector,
            resolver,
            registry,
            coordinator,
            cancel,
            media,
        }
    }
}
