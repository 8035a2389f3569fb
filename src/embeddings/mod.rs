//! Embeddings generation module
//!
//! Text is turned into vectors by an external encoder. This module provides:
//! - the [`Encoder`] capability the retrieval engine depends on
//! - [`EmbeddingClient`], an HTTP encoder for OpenAI, Ollama and a BGE-M3
//!   service (the only one that also returns lexical weights)
//! - [`EmbeddingService`], which bounds every call with a timeout and checks
//!   the returned dimension
//! - [`backfill_embeddings`], which embeds stored documents still lacking vectors
//!
//! # Examples
//!
//! ```rust,no_run
//! use threadrag::config::AppConfig;
//! use threadrag::embeddings::EmbeddingService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = EmbeddingService::new(&config)?;
//!
//!     let query = service.encode_query("who teaches the database course?").await?;
//!     println!("dense dimension: {}", query.dense.len());
//!
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod client;
pub mod generator;

use async_trait::async_trait;

pub use backfill::backfill_embeddings;
pub use backfill::BackfillStats;
pub use client::EmbeddingClient;
pub use generator::EmbeddingService;
pub use generator::QueryEmbedding;

use crate::errors::Result;
use crate::models::SparseVector;

/// Default dimension of BAAI/bge-m3 dense vectors
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

/// Maximum batch size for embedding generation
pub const MAX_BATCH_SIZE: usize = 64;

/// Output of one encoder call, aligned with the input texts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedBatch {
    pub dense: Vec<Vec<f32>>,
    /// `None` when the encoder does not produce lexical weights
    pub sparse: Option<Vec<SparseVector>>,
}

/// External text encoder
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<EncodedBatch>;

    /// Whether `encode` can return lexical weights
    fn supports_sparse(&self) -> bool {
        false
    }
}
