//! Relay endpoint: validation, upstream forwarding, and the response branch.
//!
//! Implements the relayed OpenAI-style surface:
//! - POST /v1/chat/completions (forward, then passthrough or synthesize)
//! - OPTIONS /v1/chat/completions (CORS short-circuit)
//! - GET /health
//!
//! Everything is request-scoped; the only shared state is the immutable
//! configuration and the upstream client's connection pool.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{AuthConfig, Config};
use crate::error::RelayError;
use crate::server::streaming;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub start_time: Instant,
}

impl AppState {
    /// Build state with a shared upstream client honoring the configured timeout.
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream.request_timeout())
            .build()?;

        Ok(Self {
            config,
            http,
            start_time: Instant::now(),
        })
    }
}

/// Build the axum router with all routes and layers.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Permissive CORS surface. The layer answers real preflights (those
    // carrying Access-Control-Request-Method) itself and stamps the
    // allow-origin header on every other response, errors included.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            CONTENT_LENGTH,
            ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            AUTHORIZATION,
        ]);

    Router::new()
        .route(
            "/v1/chat/completions",
            post(chat_completions).options(preflight),
        )
        .route("/health", get(health))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Response Types ────────────────────────────────────────────────────────

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    authorize(&headers, &state.config.auth)?;

    let request: Map<String, Value> =
        serde_json::from_slice(&body).map_err(|e| RelayError::MalformedRequest(e.to_string()))?;

    // Strict policy: `stream` must be present and a boolean.
    let stream = match request.get("stream") {
        Some(Value::Bool(flag)) => *flag,
        _ => return Err(RelayError::MissingStreamFlag),
    };

    let request_id = Uuid::new_v4().to_string();
    info!(request_id = %request_id, stream, "relaying chat completion");

    // Buffer the complete upstream answer before choosing how to respond;
    // synthesis needs the whole content to know what to split.
    let (content_type, upstream_body) = forward_upstream(&state, &request).await?;

    if stream {
        let chunks = streaming::synthesize(&upstream_body, state.config.stream.token_delay())?;
        Ok(([(CONNECTION, "keep-alive")], Sse::new(chunks)).into_response())
    } else {
        let content_type = content_type.unwrap_or_else(|| "application/json".to_string());
        Ok(([(CONTENT_TYPE, content_type)], upstream_body).into_response())
    }
}

/// Bare OPTIONS short-circuits with 204 and no body; preflights carrying
/// `Access-Control-Request-Method` never reach this handler.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Unknown paths and non-POST methods on the relay endpoint both 404.
async fn not_found() -> RelayError {
    RelayError::NotFound
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// ─── Validation and Forwarding ─────────────────────────────────────────────

/// Compare the Authorization header against the expected bearer token.
/// The expected value never appears in responses or logs.
fn authorize(headers: &HeaderMap, auth: &AuthConfig) -> Result<(), RelayError> {
    let expected = format!("Bearer {}", auth.token);
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(RelayError::InvalidToken),
    }
}

/// POST the validated request to the configured upstream and buffer the full
/// response body. Single attempt; any transport failure maps to a 502. The
/// upstream status is not forwarded: the passthrough branch always answers
/// 200 with the body verbatim.
async fn forward_upstream(
    state: &AppState,
    request: &Map<String, Value>,
) -> Result<(Option<String>, Bytes), RelayError> {
    let response = state
        .http
        .post(&state.config.upstream.url)
        .json(request)
        .send()
        .await?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.bytes().await?;
    debug!(status = %status, bytes = body.len(), "upstream answered");

    Ok((content_type, body))
}
