//! HTTP API v1: the buffering engine over REST.
//!
//! Endpoints:
//!
//! - `POST   /v1/messages`                   : Inbound message → WAIT / READY / SKIPPED
//! - `POST   /v1/conversations/{id}/resume`  : Resume after a WAIT window
//! - `POST   /v1/conversations/{id}/flush`   : Drain a buffer now
//! - `DELETE /v1/conversations/{id}`         : Cancel a buffer
//! - `POST   /v1/classify`                   : Classify text without buffering

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, post},
};
use chatbuffer_core::{ClassificationResult, Decision, Error, InboundMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/messages", post(message_handler))
        .route("/conversations/{id}/resume", post(resume_handler))
        .route("/conversations/{id}/flush", post(flush_handler))
        .route("/conversations/{id}", delete(cancel_handler))
        .route("/classify", post(classify_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::InvalidMessage(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "Engine request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ResumeRequest {
    revision: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub conversation_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    text: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn message_handler(
    State(state): State<SharedState>,
    Json(message): Json<InboundMessage>,
) -> Result<Json<Decision>, ApiError> {
    debug!(conversation_id = %message.chat_id, text_len = message.text.len(), "Inbound message");
    let decision = state.engine.handle(message).await.map_err(api_error)?;

    if let Some(scheduler) = &state.scheduler {
        scheduler.schedule(&decision);
    }
    Ok(Json(decision))
}

async fn resume_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<Decision>, ApiError> {
    state
        .engine
        .resume(&id, request.revision)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn flush_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Decision>, ApiError> {
    state.engine.flush(&id).await.map(Json).map_err(api_error)
}

async fn cancel_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Json<CancelResponse> {
    let cancelled = state.engine.cancel(&id).await;
    Json(CancelResponse {
        conversation_id: id,
        cancelled,
    })
}

async fn classify_handler(
    State(state): State<SharedState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassificationResult>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(api_error(Error::InvalidMessage("text must not be empty".into())));
    }
    Ok(Json(state.engine.classify(&request.text).await))
}

// ── Tests ─────────────────────────────────────────────────────────────────
