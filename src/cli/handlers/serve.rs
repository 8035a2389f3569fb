//! API server handlers

use std::sync::Arc;

use crate::app::AppContext;
use crate::Result;

pub async fn handle_serve_api(context: Arc<AppContext>, host: Option<String>, port: Option<u16>) -> Result<()> {
    use crate::api::serve_api;

    let host = host.unwrap_or_else(|| context.config.server.host.clone());
    let port = port.unwrap_or(context.config.server.port);
    let cors = context.config.server.cors;

    println!("🚀 Starting ThreadRAG API Server");
    println!("================================\n");
    println!("📍 Host: {host}");
    println!("🔌 Port: {port}");
    println!("🌐 CORS: {}", if cors { "Enabled" } else { "Disabled" });
    println!("📚 Documents: {}", context.retriever.snapshot().len());
    println!();

    serve_api(context, host, port, cors).await?;

    Ok(())
}
