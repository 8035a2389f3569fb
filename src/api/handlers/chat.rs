//! Question answering handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::error;
use tracing::info;

use super::AppState;
use crate::api::types::ChatRequest;
use crate::errors::ThreadRagError;
use crate::rag::ChatResponse;

/// Answer a question (POST /api/chat)
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    info!("POST /api/chat: {}", req.question);

    match state.context.policy.answer(&req.question).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(ThreadRagError::InvalidRequest(message)) => {
            (StatusCode::BAD_REQUEST, Json(ChatResponse::failure(message)))
        }
        Err(e) => {
            error!("Error answering question: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse::failure("Internal server error")),
            )
        }
    }
}
