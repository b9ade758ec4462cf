//! Per-peer serialization of join and leave.
//!
//! ```text
//! PeerActors (supervisor, one per coordinator)
//! └── PeerActor (one per active (room, peer) key)
//!     ├── join: evict, register, allocate, directory + media join
//!     └── leave: unregister, directory leave, media teardown
//! ```
//!
//! Offer, answer, trickle and broadcast do not go through actors; they only
//! read the session bindings.
//!
//! # Modules
//!
//! - [`messages`] - Message types and the actor key
//! - [`metrics`] - Mailbox monitoring and actor counters
//! - [`peer`] - `PeerActor` and its handle
//! - [`supervisor`] - `PeerActors`, spawning and respawning actors by key

pub mod messages;
pub mod metrics;
pub mod peer;
pub mod supervisor;

pub use messages::{AdmitRequest, PeerKey, PeerMessage};
pub use metrics::{ActorMetrics, MailboxMonitor};
pub use peer::{PeerActor, PeerActorHandle};
pub use supervisor::PeerActors;
