use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use threadrag::app::AppContext;
use threadrag::cli::handle_ask;
use threadrag::cli::handle_chat;
use threadrag::cli::handle_config_command;
use threadrag::cli::handle_embed;
use threadrag::cli::handle_ingest;
use threadrag::cli::handle_search;
use threadrag::cli::handle_serve_api;
use threadrag::cli::handle_status_command;
use threadrag::cli::Cli;
use threadrag::cli::Commands;
use threadrag::config::AppConfig;
use tracing::error;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config =
        AppConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize logging
    if cli.verbose {
        threadrag::logging::apply_backtrace_setting(&config);
        threadrag::logging::init_logging_with_level("debug")?;
    } else {
        threadrag::logging::init_logging_with_config(&config)?;
    }
    info!("Configuration loaded successfully");

    // Execute the requested command
    match cli.command {
        Commands::Ask { question } => {
            let context = build_context(&config).await?;
            handle_ask(&context, &question).await?;
        }
        Commands::Chat => {
            let context = build_context(&config).await?;
            handle_chat(&context).await?;
        }
        Commands::Search { query, top_k } => {
            let context = build_context(&config).await?;
            handle_search(&context, &query, top_k, cli.verbose).await?;
        }
        Commands::Serve { host, port } => {
            let context = build_context(&config).await?;
            handle_serve_api(context, host, port).await?;
        }
        Commands::Ingest { posts, comments } => {
            handle_ingest(&config, posts.as_deref(), comments.as_deref()).await?;
        }
        Commands::Embed { batch_size } => {
            handle_embed(&config, batch_size).await?;
        }
        Commands::Config => {
            handle_config_command(&config).await?;
        }
        Commands::Status => {
            handle_status_command(&config).await?;
        }
    }

    Ok(())
}

/// Startup check failures end the process
async fn build_context(config: &AppConfig) -> anyhow::Result<Arc<AppContext>> {
    AppContext::global(config).await.map_err(|e| {
        if e.is_fatal_at_startup() {
            error!("Startup check failed: {}", e);
        }
        anyhow::Error::from(e).context("failed to initialize the retrieval engine")
    })
}
