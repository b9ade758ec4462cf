//! Peer actor lifecycle tests.
//!
//! Per-key ordering of join and leave, idle retirement and respawn, and
//! shutdown of the actor tree.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::{PeerId, RoomId};
use sc_service::coordinator::LeaveRequest;
use sc_test_utils::{MockMediaNode, TestCluster, TestOffer};
use std::sync::Arc;
use std::time::Duration;

fn leave_all(room_id: &str) -> LeaveRequest {
    LeaveRequest {
        room_id: RoomId::from(room_id),
        session_id: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_idle_actor_retires_and_is_respawned() {
    let cluster = TestCluster::builder()
        .directory("islb-1")
        .media("sfu-1")
        .idle_timeout(Duration::from_secs(1))
        .build();
    let actors = cluster.coordinator.actors();

    let joined = cluster.join("u1", "r1", TestOffer::new()).await.unwrap();
    assert_eq!(actors.active_count().await, 1);
    assert_eq!(actors.metrics().actors_spawned(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(actors.active_count().await, 0);
    assert_eq!(actors.metrics().active_actors(), 0);

    // Registration outlives the actor; a fresh actor serves the leave.
    assert_eq!(cluster.registry.peer_count().await, 1);
    cluster
        .coordinator
        .leave(PeerId::from("u1"), leave_all("r1"))
        .await
        .unwrap();

    assert_eq!(actors.metrics().actors_spawned(), 2);
    assert_eq!(cluster.registry.peer_count().await, 0);
    assert!(!cluster.media("sfu-1").has_session(&joined.session_id));
}

#[tokio::test(start_paused = true)]
async fn test_busy_actor_does_not_retire() {
    let cluster = TestCluster::builder()
        .directory("islb-1")
        .media("sfu-1")
        .idle_timeout(Duration::from_secs(10))
        .build();
    let actors = cluster.coordinator.actors();

    for _ in 0..3 {
        cluster.join("u1", "r1", TestOffer::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
    }

    assert_eq!(actors.metrics().actors_spawned(), 1);
    assert_eq!(actors.metrics().total_messages_processed(), 3);
}

#[tokio::test]
async fn test_leave_queued_behind_join_sees_the_joined_peer() {
    let cluster = Arc::new(
        TestCluster::builder()
            .directory("islb-1")
            .with_media(MockMediaNode::new("sfu-1").with_join_delay(Duration::from_millis(100)))
            .build(),
    );

    let joiner = {
        let cluster = Arc::clone(&cluster);
        tokio::spawn(async move { cluster.join("u1", "r1", TestOffer::new()).await })
    };
    // Let the join reach the actor before the leave is sent.
    tokio::time::sleep(Duration::from_millis(20)).await;
    cluster
        .coordinator
        .leave(PeerId::from("u1"), leave_all("r1"))
        .await
        .unwrap();

    let joined = joiner.await.unwrap().unwrap();
    let media = cluster.media("sfu-1");
    assert_eq!(media.count("media-leave"), 1);
    assert!(!media.has_session(&joined.session_id));
    assert_eq!(cluster.registry.peer_count().await, 0);
}

#[tokio::test]
async fn test_one_actor_per_key() {
    let cluster = TestCluster::builder()
        .directory("islb-1")
        .media("sfu-1")
        .build();
    let actors = cluster.coordinator.actors();

    cluster.join("u1", "r1", TestOffer::new()).await.unwrap();
    cluster.join("u1", "r1", TestOffer::new()).await.unwrap();
    cluster.join("u2", "r1", TestOffer::new()).await.unwrap();
    cluster.join("u1", "r2", TestOffer::new()).await.unwrap();

    assert_eq!(actors.active_count().await, 3);
    assert_eq!(actors.metrics().actors_spawned(), 3);
}

#[tokio::test]
async fn test_shutdown_stops_every_actor() {
    let cluster = TestCluster::builder()
        .directory("islb-1")
        .media("sfu-1")
        .build();
    let actors = cluster.coordinator.actors();
    cluster.join("u1", "r1", TestOffer::new()).await.unwrap();
    cluster.join("u2", "r1", TestOffer::new()).await.unwrap();
    assert_eq!(actors.metrics().active_actors(), 2);

    cluster.coordinator.shutdown().await;

    assert_eq!(actors.metrics().active_actors(), 0);
    assert_eq!(actors.active_count().await, 0);
    let leave = cluster
        .coordinator
        .leave(PeerId::from("u1"), leave_all("r1"))
        .await;
    assert!(leave.is_err());
}

#[tokio::test]
async fn test_cancelling_the_root_token_stops_actors() {
    let cluster = TestCluster::builder()
        .directory("islb-1")
        .media("sfu-1")
        .build();
    let actors = cluster.coordinator.actors();
    cluster.join("u1", "r1", TestOffer::new()).await.unwrap();

    cluster.cancel.cancel();
    for _ in 0..50 {
        if actors.metrics().active_actors() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(actors.metrics().active_actors(), 0);
}
