//! CLI command handlers module
//!
//! This module is organized by functional domains:
//! - rag: question answering, interactive chat and search
//! - ingest: loading crawl exports into the document store
//! - embeddings: embedding backfill
//! - serve: API server
//! - info: configuration display and store status

pub mod embeddings;
pub mod info;
pub mod ingest;
pub mod rag;
pub mod serve;

// Re-export all public handlers
pub use embeddings::*;
pub use info::*;
pub use ingest::*;
pub use rag::*;
pub use serve::*;
