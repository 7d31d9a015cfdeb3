//! HTTP error handling and response mapping.
//!
//! Every failure is local to one request; nothing is retried. Each variant
//! maps to a status code and an OpenAI-style error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Authorization header missing or not equal to the expected bearer token.
    #[error("invalid or missing bearer token")]
    InvalidToken,

    /// Unknown path, or a method other than POST/OPTIONS on the relay endpoint.
    #[error("not found")]
    NotFound,

    /// Request body is not valid JSON.
    #[error("malformed request body: {0}")]
    MalformedRequest(String),

    /// The `stream` field is absent or not a boolean.
    #[error("`stream` field missing or not a boolean")]
    MissingStreamFlag,

    /// Connection, timeout, or body-read failure against the upstream API.
    #[error("upstream request failed: {0}")]
    UpstreamUnreachable(#[from] reqwest::Error),

    /// Upstream body failed to decode, or carried no choices.
    #[error("upstream response malformed: {0}")]
    UpstreamMalformed(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            RelayError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_request_error",
                self.to_string(),
            ),
            RelayError::NotFound => (StatusCode::NOT_FOUND, "invalid_request_error", self.to_string()),
            RelayError::MalformedRequest(_) | RelayError::MissingStreamFlag => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                self.to_string(),
            ),
            RelayError::UpstreamUnreachable(e) => {
                // Detail goes to the log; clients get a generic message so the
                // upstream URL stays internal.
                tracing::error!(error = %e, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "unable to reach the upstream completion API".to_string(),
                )
            }
            RelayError::UpstreamMalformed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_error",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "param": null,
                "code": null,
            }
        }));

        (status, body).into_response()
    }
}
