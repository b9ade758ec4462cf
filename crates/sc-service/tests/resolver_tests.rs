//! Cluster resolver tests.
//!
//! Exercises `ClusterResolver` over a live node table with in-process nodes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::{NodeId, SessionId};
use sc_service::cluster::{
    ClusterResolver, NodeConnector, NodeInfo, NodeKind, NodeResolver, NodeTable, ResolveScope,
    SessionKey,
};
use sc_service::errors::ScError;
use sc_service::rpc::NodeRpc;
use sc_test_utils::{MockConnector, MockDirectory, MockMediaNode};
use std::sync::Arc;

struct Fixture {
    table: Arc<NodeTable>,
    connector: Arc<MockConnector>,
    resolver: ClusterResolver,
}

fn fixture(directories: &[&str], media: &[&str]) -> Fixture {
    let connector = Arc::new(MockConnector::new());
    let mut nodes = Vec::new();
    for id in directories {
        let rpc: Arc<dyn NodeRpc> = Arc::new(MockDirectory::new());
        connector.register(id, rpc);
        nodes.push(NodeInfo::new(NodeId::from(*id), NodeKind::Directory));
    }
    for id in media {
        let rpc: Arc<dyn NodeRpc> = Arc::new(MockMediaNode::new(id));
        connector.register(id, rpc);
        nodes.push(NodeInfo::new(NodeId::from(*id), NodeKind::Media));
    }

    let table = Arc::new(NodeTable::from_nodes(nodes));
    let node_connector: Arc<dyn NodeConnector> = connector.clone();
    let resolver = ClusterResolver::new(Arc::clone(&table), node_connector);
    Fixture {
        table,
        connector,
        resolver,
    }
}

fn key(peer: &str, session: &str) -> SessionKey {
    SessionKey::new(peer.into(), "r1".into(), SessionId::from(session))
}

#[tokio::test]
async fn test_directory_resolves_to_lowest_id() {
    let f = fixture(&["islb-b", "islb-a"], &[]);

    let node = f
        .resolver
        .resolve(NodeKind::Directory, ResolveScope::Cluster)
        .await
        .unwrap();

    assert_eq!(node.info.id, NodeId::from("islb-a"));
    assert_eq!(node.info.rpc_subject, "rpc-islb-a");
}

#[tokio::test]
async fn test_missing_kind_is_a_resolution_failure() {
    let f = fixture(&[], &["sfu-1"]);

    let err = f
        .resolver
        .resolve(NodeKind::Directory, ResolveScope::Cluster)
        .await
        .unwrap_err();

    assert!(
        matches!(err, ScError::Resolution { kind: NodeKind::Directory, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_allocation_is_stable_for_a_session() {
    let f = fixture(&[], &["sfu-1", "sfu-2"]);

    let first = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Allocate(key("u1", "s-1")))
        .await
        .unwrap();
    let again = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Allocate(key("u1", "s-1")))
        .await
        .unwrap();
    let bound = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Bound(key("u1", "s-1")))
        .await
        .unwrap();

    assert_eq!(first.info.id, again.info.id);
    assert_eq!(first.info.id, bound.info.id);
    assert_eq!(f.resolver.bindings().len().await, 1);
}

#[tokio::test]
async fn test_allocation_balances_load() {
    let f = fixture(&[], &["sfu-1", "sfu-2"]);

    let mut chosen = Vec::new();
    for n in 0..4 {
        let node = f
            .resolver
            .resolve(
                NodeKind::Media,
                ResolveScope::Allocate(key("u1", &format!("s-{n}"))),
            )
            .await
            .unwrap();
        chosen.push(node.info.id.to_string());
    }

    assert_eq!(chosen, vec!["sfu-1", "sfu-2", "sfu-1", "sfu-2"]);
}

#[tokio::test]
async fn test_bound_never_allocates() {
    let f = fixture(&[], &["sfu-1"]);

    let err = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Bound(key("u1", "s-1")))
        .await
        .unwrap_err();

    assert!(matches!(err, ScError::Resolution { .. }), "got {err:?}");
    assert!(f.resolver.bindings().is_empty().await);
    assert_eq!(f.connector.connect_count(), 0);
}

#[tokio::test]
async fn test_session_owned_by_another_peer_is_not_shared() {
    let f = fixture(&[], &["sfu-1"]);
    f.resolver
        .resolve(NodeKind::Media, ResolveScope::Allocate(key("u1", "s-1")))
        .await
        .unwrap();

    let bound = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Bound(key("u2", "s-1")))
        .await;
    let allocated = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Allocate(key("u2", "s-1")))
        .await;

    assert!(matches!(bound, Err(ScError::Resolution { .. })), "{bound:?}");
    assert!(matches!(allocated, Err(ScError::Resolution { .. })), "{allocated:?}");
}

#[tokio::test]
async fn test_bound_node_that_left_is_not_replaced() {
    let f = fixture(&[], &["sfu-1", "sfu-2"]);
    let node = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Allocate(key("u1", "s-1")))
        .await
        .unwrap();
    f.table.remove(&node.info.id).await;

    let err = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Bound(key("u1", "s-1")))
        .await
        .unwrap_err();

    assert!(matches!(err, ScError::Resolution { .. }), "got {err:?}");
    // The binding survives; the node may come back.
    assert_eq!(f.resolver.bindings().len().await, 1);

    f.table.upsert(node.info.clone()).await;
    let back = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Bound(key("u1", "s-1")))
        .await
        .unwrap();
    assert_eq!(back.info.id, node.info.id);
}

#[tokio::test]
async fn test_release_requires_the_owning_key() {
    let f = fixture(&[], &["sfu-1"]);
    f.resolver
        .resolve(NodeKind::Media, ResolveScope::Allocate(key("u1", "s-1")))
        .await
        .unwrap();

    assert!(!f.resolver.release(&key("u2", "s-1")).await);
    assert!(f.resolver.release(&key("u1", "s-1")).await);
    assert!(!f.resolver.release(&key("u1", "s-1")).await);
    assert!(f.resolver.bindings().is_empty().await);
}

#[tokio::test]
async fn test_media_requires_a_session_scope() {
    let f = fixture(&["islb-1"], &["sfu-1"]);

    let media = f
        .resolver
        .resolve(NodeKind::Media, ResolveScope::Cluster)
        .await;
    let directory = f
        .resolver
        .resolve(NodeKind::Directory, ResolveScope::Bound(key("u1", "s-1")))
        .await;

    assert!(matches!(media, Err(ScError::Resolution { .. })), "{media:?}");
    assert!(matches!(directory, Err(ScError::Resolution { .. })), "{directory:?}");
}

#[tokio::test]
async fn test_rpc_handles_are_cached_per_node() {
    let f = fixture(&["islb-1"], &[]);

    for _ in 0..5 {
        f.resolver
            .resolve(NodeKind::Directory, ResolveScope::Cluster)
            .await
            .unwrap();
    }

    assert_eq!(f.connector.connect_count(), 1);
}
