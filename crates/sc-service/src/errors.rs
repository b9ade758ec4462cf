//! Session Coordinator error types.
//!
//! Every client-visible failure is one of the variants below. Validation,
//! parse and resolution failures are raised before any directory mutation for
//! the request; remote failures carry the code and reason reported by the
//! directory or media node. Internal details are logged server-side and never
//! returned to clients.

use crate::cluster::NodeKind;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Session Coordinator error type.
///
/// Maps to signaling error codes:
/// - `Validation`, `Parse`: 400
/// - `Resolution`: 500 (no live node of the required kind/scope)
/// - `Remote`: the code reported by the remote node, unmodified
/// - `Config`, `Internal`: 500
#[derive(Debug, Error)]
pub enum ScError {
    /// Missing or malformed required field.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed negotiation payload.
    #[error("Could not parse negotiation payload: {0}")]
    Parse(String),

    /// No live node of the required kind/scope.
    #[error("No {kind} node resolved: {reason}")]
    Resolution { kind: NodeKind, reason: String },

    /// Failure reported by a directory or media node during a synchronous call.
    #[error("Remote error {code}: {reason}")]
    Remote { code: i32, reason: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel failures and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScError {
    /// Returns the signaling error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            ScError::Validation(_) | ScError::Parse(_) => 400,
            ScError::Resolution { .. } | ScError::Config(_) | ScError::Internal(_) => 500,
            ScError::Remote { code, .. } => *code,
        }
    }

    /// Returns the HTTP status used when this error is returned over the API.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScError::Validation(_) | ScError::Parse(_) => StatusCode::BAD_REQUEST,
            ScError::Resolution { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ScError::Remote { code, .. } => u16::try_from(*code)
                .ok()
                .filter(|c| (400..=599).contains(c))
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ScError::Config(_) | ScError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a bounded label for metrics.
    #[must_use]
    pub fn error_type_label(&self) -> &'static str {
        match self {
            ScError::Validation(_) => "validation",
            ScError::Parse(_) => "parse",
            ScError::Resolution { .. } => "resolution",
            ScError::Remote { .. } => "remote",
            ScError::Config(_) => "config",
            ScError::Internal(_) => "internal",
        }
    }

    /// Returns a client-safe error message.
    ///
    /// Remote reasons are passed through verbatim; internal details are not.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            ScError::Validation(msg) => msg.clone(),
            ScError::Parse(_) => "Could not parse negotiation payload".to_string(),
            ScError::Resolution { kind, .. } => format!("Not found any node for {kind}"),
            ScError::Remote { reason, .. } => reason.clone(),
            ScError::Config(_) | ScError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: i32,
    kind: &'static str,
    message: String,
}

impl IntoResponse for ScError {
    fn into_response(self) -> Response {
        match &self {
            ScError::Config(detail) | ScError::Internal(detail) => {
                tracing::error!(target: "sc.errors", error = %detail, "Internal failure");
            }
            ScError::Resolution { kind, reason } => {
                tracing::warn!(target: "sc.errors", kind = %kind, reason = %reason, "Node resolution failed");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                kind: self.error_type_label(),
                message: self.client_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ScError::Validation("room".into()).error_code(), 400);
        assert_eq!(ScError::Parse("v= missing".into()).error_code(), 400);
        assert_eq!(
            ScError::Resolution {
                kind: NodeKind::Directory,
                reason: "none live".into()
            }
            .error_code(),
            500
        );
        assert_eq!(
            ScError::Remote {
                code: 487,
                reason: "renegotiation refused".into()
            }
            .error_code(),
            487
        );
        assert_eq!(ScError::Internal("boom".into()).error_code(), 500);
    }

    #[test]
    fn test_status_code_for_remote_errors() {
        let in_range = ScError::Remote {
            code: 404,
            reason: "session gone".into(),
        };
        assert_eq!(in_range.status_code(), StatusCode::NOT_FOUND);

        let out_of_range = ScError::Remote {
            code: 7,
            reason: "custom".into(),
        };
        assert_eq!(out_of_range.status_code(), StatusCode::BAD_GATEWAY);

        let negative = ScError::Remote {
            code: -1,
            reason: "custom".into(),
        };
        assert_eq!(negative.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = ScError::Internal("channel send failed: 10.0.0.7".into());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = ScError::Resolution {
            kind: NodeKind::Media,
            reason: "media node sfu-3 left the cluster".into(),
        };
        assert!(!err.client_message().contains("sfu-3"));
        assert_eq!(err.client_message(), "Not found any node for media");
    }

    #[tokio::test]
    async fn test_remote_error_response_passes_code_and_reason_through() {
        let response = ScError::Remote {
            code: 488,
            reason: "not acceptable here".into(),
        }
        .into_response();

        assert_eq!(response.status().as_u16(), 488);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], 488);
        assert_eq!(body["error"]["kind"], "remote");
        assert_eq!(body["error"]["message"], "not acceptable here");
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let response = ScError::Validation("room_id must not be empty".into()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], 400);
        assert_eq!(body["error"]["kind"], "validation");
        assert_eq!(body["error"]["message"], "room_id must not be empty");
    }
}
