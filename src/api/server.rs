//! HTTP server implementation

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers;
use crate::api::handlers::AppState;
use crate::api::routes;
use crate::app::AppContext;
use crate::Result;

/// Build the full application router
pub fn build_router(context: Arc<AppContext>, enable_cors: bool) -> Router {
    let state = AppState::new(context);

    let mut app = Router::new()
        .route("/", get(handlers::root))
        .nest("/api", routes::api_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        );

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Start the API server
pub async fn serve_api(context: Arc<AppContext>, host: String, port: u16, enable_cors: bool) -> Result<()> {
    info!("🚀 Starting ThreadRAG API server...");
    let app = build_router(context, enable_cors);
    if enable_cors {
        info!("✅ CORS enabled");
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 API server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /            - API information");
    info!("  GET  /api/health  - Health check");
    info!("  POST /api/chat    - Answer a question");
    info!("  POST /api/search  - Ranked documents without generation");

    axum::serve(listener, app).await?;

    Ok(())
}
