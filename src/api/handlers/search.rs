//! Retrieval-only handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::error;
use tracing::info;

use super::AppState;
use crate::api::types::ApiResponse;
use crate::api::types::SearchRequest;
use crate::api::types::SearchResponse;

/// Rank documents for a query without calling the generation model (POST /api/search)
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> (StatusCode, Json<ApiResponse<SearchResponse>>) {
    info!("POST /api/search: {}", req.query);

    let query = req.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Query is required")),
        );
    }

    match state.context.retriever.retrieve(query, req.top_k).await {
        Ok(results) => (
            StatusCode::OK,
            Json(ApiResponse::success(SearchResponse {
                query: query.to_string(),
                results,
            })),
        ),
        Err(e) => {
            error!("Error searching documents: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
