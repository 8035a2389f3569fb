pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod store;

pub use config::AppConfig;
pub use errors::*;
