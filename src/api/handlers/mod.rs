//! API request handlers
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::types::HealthResponse;
use crate::api::types::ServiceInfo;
use crate::app::AppContext;

pub mod chat;
pub mod search;

pub use chat::*;
pub use search::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<AppContext>,
}

impl AppState {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

/// Service information handler
pub async fn root() -> Json<ServiceInfo> {
    let endpoints = BTreeMap::from([
        ("GET /".to_string(), "API information (this endpoint)".to_string()),
        ("GET /api/health".to_string(), "Health check".to_string()),
        (
            "POST /api/chat".to_string(),
            "Answer a question: {\"question\": \"...\"}".to_string(),
        ),
        (
            "POST /api/search".to_string(),
            "Ranked documents without generation: {\"query\": \"...\", \"top_k\": 5}".to_string(),
        ),
    ]);

    Json(ServiceInfo {
        name: "ThreadRAG API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        endpoints,
    })
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "ThreadRAG API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.context.retriever.snapshot().len(),
    })
}
