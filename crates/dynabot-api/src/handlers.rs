//! Route handler functions for all API endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dynabot_core::types::{AnalyticsSnapshot, InteractionRecord};
use dynabot_storage::error_log::DEFAULT_TAIL_LINES;

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on `GET /errors?limit=`.
const MAX_ERROR_LINES: usize = 1000;

// =============================================================================
// Request / response types
// =============================================================================

/// Request body for POST /get_response.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

/// Response body for POST /get_response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorsParams {
    pub limit: Option<usize>,
}

/// Response body for GET /errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorsResponse {
    /// Raw error log lines, oldest first.
    pub lines: Vec<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub session_available: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /get_response - run one chat turn.
///
/// A provider failure still answers 200 with the fallback text.
pub async fn get_response(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let message = req
        .message
        .ok_or_else(|| ApiError::BadRequest("message is required".to_string()))?;

    let reply = state.orchestrator.handle_message(&message).await?;
    info!(
        chars = message.chars().count(),
        fallback = reply.is_fallback(),
        "Chat turn completed"
    );

    Ok(Json(ChatResponseBody {
        response: reply.into_text(),
    }))
}

/// GET /analytics - the durable analytics snapshot.
pub async fn analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsSnapshot>, ApiError> {
    state
        .snapshots
        .load()?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Analytics not found".to_string()))
}

/// GET /history - the full conversation log.
pub async fn history(
    State(state): State<AppState>,
) -> Result<Json<Vec<InteractionRecord>>, ApiError> {
    let records = state.orchestrator.conversation_log().load_all()?;
    debug!(count = records.len(), "History served");
    Ok(Json(records))
}

/// GET /errors - the last `limit` error log lines (default 10).
pub async fn errors(
    State(state): State<AppState>,
    Query(params): Query<ErrorsParams>,
) -> Result<Json<ErrorsResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TAIL_LINES)
        .min(MAX_ERROR_LINES);
    let lines = state.orchestrator.error_log().tail(limit)?;
    Ok(Json(ErrorsResponse { lines }))
}

/// GET /health - liveness and provider session status.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let session_available = state.orchestrator.session_available();
    Json(HealthResponse {
        status: if session_available {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        session_available,
    })
}
