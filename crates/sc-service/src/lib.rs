//! Session Coordinator (SC) Service Library
//!
//! The Session Coordinator admits peers into rooms, allocates one media
//! session per admitted peer, routes SDP/ICE renegotiation to the media node
//! that owns each session, and keeps the cluster directory in step with the
//! peers registered on this node.
//!
//! # Architecture
//!
//! ```text
//! signaling HTTP API (handlers, routes)
//! └── SessionCoordinator
//!     ├── PeerActors (one PeerActor per room/peer key: join + leave)
//!     │   └── PeerActor ── directory + media RPCs, PeerRegistry updates
//!     └── negotiation (offer, answer, trickle, broadcast)
//!         └── NodeResolver ── NodeTable + SessionBindings
//!             └── NodeRpc (BusClient: sync request / async relay)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Keyed serialization of join/leave per (room, peer)
//! - [`cluster`] - Node kinds, live node table, session bindings, resolver
//! - [`config`] - Service configuration from environment
//! - [`coordinator`] - The six client-facing operations
//! - [`errors`] - Error taxonomy and HTTP mapping
//! - [`registry`] - Local peer registry
//! - [`rpc`] - Node RPC messages, typed clients and the bus transport
//! - [`sdp`] - Negotiation payload inspection

pub mod actors;
pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod rpc;
pub mod sdp;
