//! Identifiers used across the session coordination cluster.
//!
//! Room, peer, stream and node identifiers are supplied from outside (by
//! clients or by cluster discovery) and are treated as opaque strings.
//! Session identifiers are the only ones minted here, and only by the
//! coordinator that admits the peer.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (never valid on the wire).
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a room. Rooms exist implicitly while they hold peers.
    RoomId
);

opaque_id!(
    /// Identifier of a peer, unique within its room and chosen by the client.
    PeerId
);

opaque_id!(
    /// Identifier of one declared media stream inside a negotiation payload.
    StreamId
);

opaque_id!(
    /// Identifier of a cluster node, as published by node discovery.
    NodeId
);

opaque_id!(
    /// Identifier of one peer's media pipeline.
    ///
    /// Minted once at join time and bound to exactly one media node for its
    /// whole lifetime.
    SessionId
);

impl SessionId {
    /// Mint a fresh, globally unique session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
