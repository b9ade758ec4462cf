//! Mock media node.
//!
//! Tracks open sessions and received candidates, and can be configured to:
//! - Reject joins, offers, answers or teardowns with a remote error
//! - Behave as unreachable (every synchronous request fails)
//! - Lose every relayed candidate
//! - Hold joins for a while, to overlap concurrent operations
//!
//! # Example
//!
//! ```rust,ignore
//! use sc_test_utils::MockMediaNode;
//!
//! let media = MockMediaNode::new("sfu-1")
//!     .failing_offer(488, "codec mismatch")
//!     .with_join_delay(Duration::from_millis(50));
//! ```

use async_trait::async_trait;
use common::types::{NodeId, SessionId};
use sc_service::rpc::{Jsep, MediaJoinReply, MediaOfferReply, NodeRequest, NodeRpc, RpcError};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct MediaState {
    open_sessions: BTreeSet<SessionId>,
    candidates: Vec<(SessionId, Value)>,
    requests: Vec<NodeRequest>,
}

/// Media node double implementing [`NodeRpc`].
#[derive(Debug)]
pub struct MockMediaNode {
    id: NodeId,
    state: Mutex<MediaState>,
    fail_join: Option<RpcError>,
    fail_offer: Option<RpcError>,
    fail_answer: Option<RpcError>,
    fail_leave: Option<RpcError>,
    unreachable: bool,
    drop_relays: bool,
    dropped_relays: AtomicUsize,
    join_delay: Option<Duration>,
}

impl MockMediaNode {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(MediaState::default()),
            fail_join: None,
            fail_offer: None,
            fail_answer: None,
            fail_leave: None,
            unreachable: false,
            drop_relays: false,
            dropped_relays: AtomicUsize::new(0),
            join_delay: None,
        }
    }

    #[must_use]
    pub fn failing_join(mut self, code: i32, reason: &str) -> Self {
        self.fail_join = Some(remote(code, reason));
        self
    }

    #[must_use]
    pub fn failing_offer(mut self, code: i32, reason: &str) -> Self {
        self.fail_offer = Some(remote(code, reason));
        self
    }

    #[must_use]
    pub fn failing_answer(mut self, code: i32, reason: &str) -> Self {
        self.fail_answer = Some(remote(code, reason));
        self
    }

    /// Reject `media-leave`; the session stays open.
    #[must_use]
    pub fn failing_leave(mut self, code: i32, reason: &str) -> Self {
        self.fail_leave = Some(remote(code, reason));
        self
    }

    /// Silently lose every relayed candidate.
    #[must_use]
    pub fn dropping_relays(mut self) -> Self {
        self.drop_relays = true;
        self
    }

    /// Fail every synchronous request as unreachable.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    #[must_use]
    pub fn with_join_delay(mut self, delay: Duration) -> Self {
        self.join_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The answer this node returns for every offer.
    #[must_use]
    pub fn answer_for(&self, session_id: &SessionId) -> Jsep {
        Jsep::answer(format!(
            "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns={}\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:{}\r\n",
            self.id, session_id
        ))
    }

    pub fn open_sessions(&self) -> Vec<SessionId> {
        self.state
            .lock()
            .unwrap()
            .open_sessions
            .iter()
            .cloned()
            .collect()
    }

    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.state
            .lock()
            .unwrap()
            .open_sessions
            .contains(session_id)
    }

    /// Candidates received, in arrival order.
    pub fn candidates(&self) -> Vec<(SessionId, Value)> {
        self.state.lock().unwrap().candidates.clone()
    }

    pub fn dropped_relays(&self) -> usize {
        self.dropped_relays.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<NodeRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method() == method)
            .count()
    }

    fn record(&self, request: &NodeRequest) {
        self.state.lock().unwrap().requests.push(request.clone());
    }
}

fn remote(code: i32, reason: &str) -> RpcError {
    RpcError::Remote {
        code,
        reason: reason.to_string(),
    }
}

fn to_value<T: serde::Serialize>(reply: &T) -> Result<Value, RpcError> {
    serde_json::to_value(reply).map_err(|e| RpcError::InvalidReply(e.to_string()))
}

#[async_trait]
impl NodeRpc for MockMediaNode {
    async fn request(&self, request: NodeRequest) -> Result<Value, RpcError> {
        self.record(&request);

        if self.unreachable {
            return Err(RpcError::Unreachable(format!("{} is down", self.id)));
        }

        match request {
            NodeRequest::MediaJoin { session_id, .. } => {
                if let Some(delay) = self.join_delay {
                    tokio::time::sleep(delay).await;
                }
                if let Some(e) = &self.fail_join {
                    return Err(e.clone());
                }
                self.state
                    .lock()
                    .unwrap()
                    .open_sessions
                    .insert(session_id.clone());
                to_value(&MediaJoinReply {
                    jsep: self.answer_for(&session_id),
                    info: json!({ "node": self.id.as_str() }),
                })
            }
            NodeRequest::MediaLeave { session_id, .. } => {
                if let Some(e) = &self.fail_leave {
                    return Err(e.clone());
                }
                self.state
                    .lock()
                    .unwrap()
                    .open_sessions
                    .remove(&session_id);
                Ok(Value::Null)
            }
            NodeRequest::MediaOffer { session_id, .. } => {
                if let Some(e) = &self.fail_offer {
                    return Err(e.clone());
                }
                to_value(&MediaOfferReply {
                    jsep: self.answer_for(&session_id),
                })
            }
            NodeRequest::MediaAnswer { .. } => {
                if let Some(e) = &self.fail_answer {
                    return Err(e.clone());
                }
                Ok(Value::Null)
            }
            other => Err(remote(
                501,
                &format!("media node does not handle {}", other.method()),
            )),
        }
    }

    fn notify(&self, request: NodeRequest) {
        self.record(&request);

        // Lost relays are invisible to the sender.
        if self.unreachable || self.drop_relays {
            self.dropped_relays.fetch_add(1, Ordering::SeqCst);
            return;
        }

        if let NodeRequest::MediaTrickle {
            session_id,
            candidate,
            ..
        } = request
        {
            self.state
                .lock()
                .unwrap()
                .candidates
                .push((session_id, candidate));
        }
    }
}
