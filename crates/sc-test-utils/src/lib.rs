//! # SC Test Utilities
//!
//! Shared test utilities for the Session Coordinator (SC) service.
//!
//! Provides in-process stand-ins for the cluster so coordinator behavior can
//! be exercised without a message bus or real directory/media nodes.
//!
//! ## Modules
//!
//! - `mock_directory` - Directory node with real roster/session/stream bookkeeping
//! - `mock_media` - Media node with programmable failures and delays
//! - `mock_connector` - `NodeConnector` that hands out the mocks by node ID
//! - `cluster` - `TestCluster` builder wiring mocks, resolver and coordinator
//! - `fixtures` - SDP offers, malformed payloads and request builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let cluster = TestCluster::builder()
//!         .directory("islb-1")
//!         .media("sfu-1")
//!         .build();
//!
//!     let response = cluster
//!         .coordinator
//!         .join("u1".into(), join_request("r1", TestOffer::new().stream("s1")), Default::default())
//!         .await
//!         .unwrap();
//!
//!     assert!(response.peers.is_empty());
//!     assert_eq!(cluster.directory.streams_in(&"r1".into()).len(), 1);
//! }
//! ```

pub mod cluster;
pub mod fixtures;
pub mod mock_connector;
pub mod mock_directory;
pub mod mock_media;

// Re-export commonly used items
pub use cluster::*;
pub use fixtures::*;
pub use mock_connector::*;
pub use mock_directory::*;
pub use mock_media::*;
