//! Node RPC: request/reply and fire-and-forget messages to cluster nodes.
//!
//! [`NodeRpc`] is the transport seam. Its two modes match the bus contract:
//! `request` publishes and awaits exactly one correlated reply (bounded by
//! the transport's timeout), `notify` hands a relay over and returns at once.
//! Typed wrappers ([`DirectoryClient`], [`MediaClient`]) sit on top of it.

mod bus;
mod directory;
mod media;
mod messages;

pub use bus::{BusClient, BusConfig, BusNodeRpc};
pub use directory::DirectoryClient;
pub use media::MediaClient;
pub use messages::{
    Jsep, ListSessionsReply, MediaJoinReply, MediaOfferReply, NodeRequest, PeerJoinReply,
    RosterPeer, RosterStream, SdpType,
};

use crate::errors::ScError;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Handle for sending RPCs to one node.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Synchronous mode: publish and await the correlated reply.
    ///
    /// # Errors
    ///
    /// Returns `RpcError` on timeout, transport failure, remote failure or an
    /// undecodable reply.
    async fn request(&self, request: NodeRequest) -> Result<Value, RpcError>;

    /// Asynchronous mode: hand the message over for delivery and return.
    ///
    /// Delivery failures are never reported to the caller.
    fn notify(&self, request: NodeRequest);
}

/// Failure of a synchronous RPC.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,

    #[error("node unreachable: {0}")]
    Unreachable(String),

    #[error("remote error {code}: {reason}")]
    Remote { code: i32, reason: String },

    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl RpcError {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            RpcError::Timeout => "timeout",
            RpcError::Unreachable(_) => "unreachable",
            RpcError::Remote { .. } => "remote",
            RpcError::InvalidReply(_) => "invalid_reply",
        }
    }
}

/// Remote failures keep their code and reason; transport failures get a code.
impl From<RpcError> for ScError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote { code, reason } => ScError::Remote { code, reason },
            RpcError::Timeout => ScError::Remote {
                code: 408,
                reason: "request timed out".to_string(),
            },
            RpcError::Unreachable(reason) => ScError::Remote { code: 503, reason },
            RpcError::InvalidReply(reason) => ScError::Remote { code: 502, reason },
        }
    }
}

/// Failure of a fire-and-forget relay. Logged and counted, never returned.
#[derive(Debug, Error)]
pub enum RelayFailure {
    #[error("relay queue full")]
    QueueFull,

    #[error("relay queue closed")]
    QueueClosed,

    #[error("delivery failed: {0}")]
    Delivery(RpcError),
}

impl RelayFailure {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            RelayFailure::QueueFull => "queue_full",
            RelayFailure::QueueClosed => "queue_closed",
            RelayFailure::Delivery(_) => "delivery",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_pass_through_verbatim() {
        let err: ScError = RpcError::Remote {
            code: 487,
            reason: "offer rejected by sfu".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            ScError::Remote { code: 487, ref reason } if reason == "offer rejected by sfu"
        ));
    }

    #[test]
    fn test_transport_errors_get_codes() {
        assert_eq!(ScError::from(RpcError::Timeout).error_code(), 408);
        assert_eq!(
            ScError::from(RpcError::Unreachable("refused".into())).error_code(),
            503
        );
        assert_eq!(
            ScError::from(RpcError::InvalidReply("not json".into())).error_code(),
            502
        );
    }
}
