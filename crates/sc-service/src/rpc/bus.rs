//! Message-bus transport.
//!
//! Talks to the bus through its HTTP gateway:
//!
//! - synchronous: `POST {bus}/rpc/{subject}`; the gateway publishes, waits
//!   for the correlated reply and answers with `{"result": ...}` or
//!   `{"error": {"code", "reason"}}`.
//! - asynchronous: messages go into a bounded relay queue drained by one
//!   worker task that `POST`s them to `{bus}/notify/{subject}`. A full queue
//!   drops the message. The worker is independent of whoever enqueued, so
//!   cancelling an operation never cancels a relay it already handed over.
//!
//! The bus URL may embed credentials; it is never logged and reqwest errors
//! are stripped of their URL before they are surfaced.

use super::messages::NodeRequest;
use super::{NodeRpc, RelayFailure, RpcError};
use crate::cluster::{NodeConnector, NodeInfo};
use crate::errors::ScError;
use crate::observability::metrics;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Transport settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub url: SecretString,
    /// Bound on every synchronous request (connect + total).
    pub rpc_timeout: Duration,
    pub relay_queue_capacity: usize,
}

#[derive(Clone)]
struct Gateway {
    http: reqwest::Client,
    base_url: SecretString,
}

impl Gateway {
    fn url(&self, mode: &str, subject: &str) -> String {
        format!(
            "{}/{mode}/{subject}",
            self.base_url.expose_secret().trim_end_matches('/')
        )
    }
}

#[derive(Debug)]
struct Relay {
    subject: String,
    request: NodeRequest,
}

/// Client for the message-bus gateway.
#[derive(Clone)]
pub struct BusClient {
    gateway: Gateway,
    relay_tx: mpsc::Sender<Relay>,
}

impl BusClient {
    /// Create the client and spawn its relay worker.
    ///
    /// The worker stops when `cancel_token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ScError::Config` if the HTTP client cannot be built.
    pub fn spawn(
        config: BusConfig,
        cancel_token: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), ScError> {
        let http = reqwest::Client::builder()
            .timeout(config.rpc_timeout)
            .connect_timeout(config.rpc_timeout)
            .build()
            .map_err(|e| ScError::Config(format!("failed to build bus HTTP client: {e}")))?;

        let gateway = Gateway {
            http,
            base_url: config.url,
        };
        let (relay_tx, receiver) = mpsc::channel(config.relay_queue_capacity);

        let worker = RelayWorker {
            gateway: gateway.clone(),
            receiver,
            cancel_token,
        };
        let task_handle = tokio::spawn(worker.run());

        Ok((Self { gateway, relay_tx }, task_handle))
    }

    /// Synchronous request to the node listening on `subject`.
    #[instrument(skip_all, name = "sc.rpc.request", fields(method = request.method(), subject = %subject))]
    pub async fn request(&self, subject: &str, request: &NodeRequest) -> Result<Value, RpcError> {
        let method = request.method();
        let start = Instant::now();

        let result = self.send_request(subject, request).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        metrics::record_rpc(method, status, start.elapsed());

        if let Err(e) = &result {
            debug!(
                target: "sc.rpc.bus",
                method,
                subject = %subject,
                error = %e,
                "Node request failed"
            );
        }
        result
    }

    async fn send_request(&self, subject: &str, request: &NodeRequest) -> Result<Value, RpcError> {
        let response = self
            .gateway
            .http
            .post(self.gateway.url("rpc", subject))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        parse_reply(status, &body)
    }

    /// Queue a relay for the node listening on `subject`. Never blocks.
    pub fn notify(&self, subject: &str, request: NodeRequest) {
        let method = request.method();
        let relay = Relay {
            subject: subject.to_string(),
            request,
        };
        match self.relay_tx.try_send(relay) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => record_relay_failure(method, &RelayFailure::QueueFull),
            Err(TrySendError::Closed(_)) => {
                record_relay_failure(method, &RelayFailure::QueueClosed);
            }
        }
    }
}

impl NodeConnector for BusClient {
    fn connect(&self, node: &NodeInfo) -> Arc<dyn NodeRpc> {
        Arc::new(BusNodeRpc {
            bus: self.clone(),
            subject: node.rpc_subject.clone(),
        })
    }
}

/// [`NodeRpc`] handle for one node, reached through the bus.
#[derive(Clone)]
pub struct BusNodeRpc {
    bus: BusClient,
    subject: String,
}

impl BusNodeRpc {
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl NodeRpc for BusNodeRpc {
    async fn request(&self, request: NodeRequest) -> Result<Value, RpcError> {
        self.bus.request(&self.subject, &request).await
    }

    fn notify(&self, request: NodeRequest) {
        self.bus.notify(&self.subject, request);
    }
}

/// Drains the relay queue.
struct RelayWorker {
    gateway: Gateway,
    receiver: mpsc::Receiver<Relay>,
    cancel_token: CancellationToken,
}

impl RelayWorker {
    async fn run(mut self) {
        info!(target: "sc.rpc.bus", "Relay worker started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sc.rpc.bus",
                        pending = self.receiver.len(),
                        "Relay worker received cancellation signal"
                    );
                    break;
                }
                relay = self.receiver.recv() => {
                    match relay {
                        Some(relay) => self.deliver(relay).await,
                        None => break,
                    }
                }
            }
        }

        info!(target: "sc.rpc.bus", "Relay worker stopped");
    }

    async fn deliver(&self, relay: Relay) {
        let method = relay.request.method();
        let result = self
            .gateway
            .http
            .post(self.gateway.url("notify", &relay.subject))
            .json(&relay.request)
            .send()
            .await;

        let failure = match result {
            Ok(response) if response.status().is_success() => None,
            Ok(response) => Some(status_error(response.status())),
            Err(e) => Some(transport_error(e)),
        };
        if let Some(e) = failure {
            record_relay_failure(method, &RelayFailure::Delivery(e));
        }
    }
}

fn record_relay_failure(method: &'static str, failure: &RelayFailure) {
    warn!(
        target: "sc.rpc.bus",
        method,
        reason = %failure,
        "Relay dropped"
    );
    metrics::record_relay_dropped(method, failure.label());
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteFault>,
}

#[derive(Debug, Deserialize)]
struct RemoteFault {
    code: i32,
    reason: String,
}

fn transport_error(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout
    } else {
        RpcError::Unreachable(e.without_url().to_string())
    }
}

fn status_error(status: StatusCode) -> RpcError {
    RpcError::Remote {
        code: i32::from(status.as_u16()),
        reason: status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

fn parse_reply(status: StatusCode, body: &[u8]) -> Result<Value, RpcError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return if status.is_success() {
            Ok(Value::Null)
        } else {
            Err(status_error(status))
        };
    }

    match (status.is_success(), serde_json::from_slice::<ReplyEnvelope>(body)) {
        (
            _,
            Ok(ReplyEnvelope {
                error: Some(fault), ..
            }),
        ) => Err(RpcError::Remote {
            code: fault.code,
            reason: fault.reason,
        }),
        (true, Ok(ReplyEnvelope { result, .. })) => Ok(result.unwrap_or(Value::Null)),
        (true, Err(e)) => Err(RpcError::InvalidReply(e.to_string())),
        (false, _) => Err(status_error(status)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reply_result() {
        let body = br#"{"result": {"session_ids": ["a"]}}"#;
        let value = parse_reply(StatusCode::OK, body).unwrap();
        assert_eq!(value, json!({"session_ids": ["a"]}));
    }

    #[test]
    fn test_parse_reply_empty_ack() {
        assert_eq!(parse_reply(StatusCode::OK, b"").unwrap(), Value::Null);
        assert_eq!(
            parse_reply(StatusCode::NO_CONTENT, b"  ").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_parse_reply_remote_error_wins_over_status() {
        let body = br#"{"error": {"code": 488, "reason": "codec mismatch"}}"#;
        let err = parse_reply(StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            RpcError::Remote {
                code: 488,
                reason: "codec mismatch".to_string()
            }
        );

        let err = parse_reply(StatusCode::BAD_GATEWAY, body).unwrap_err();
        assert!(matches!(err, RpcError::Remote { code: 488, .. }));
    }

    #[test]
    fn test_parse_reply_http_failure_without_envelope() {
        let err = parse_reply(StatusCode::SERVICE_UNAVAILABLE, b"upstream gone").unwrap_err();
        assert_eq!(
            err,
            RpcError::Remote {
                code: 503,
                reason: "Service Unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_parse_reply_garbage_on_success() {
        let err = parse_reply(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, RpcError::InvalidReply(_)));
    }

    #[test]
    fn test_gateway_url_trims_trailing_slash() {
        let gateway = Gateway {
            http: reqwest::Client::new(),
            base_url: SecretString::from("http://bus:4280/"),
        };
        assert_eq!(gateway.url("rpc", "rpc-sfu-1"), "http://bus:4280/rpc/rpc-sfu-1");
    }
}
