//! Document store capability and its backends
//!
//! The retrieval engine only ever talks to a [`DocumentStore`]; which backend
//! sits behind it is a configuration choice:
//! - [`PostgresStore`]: plain document database, dense vectors only
//! - [`QdrantStore`]: vector index service, dense vectors plus lexical weights
//! - [`MemoryStore`]: JSON Lines snapshot held in memory (also used in tests)

pub mod memory;
pub mod postgres;
pub mod qdrant;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use qdrant::QdrantStore;

use crate::config::AppConfig;
use crate::config::StoreBackend;
use crate::errors::Result;
use crate::models::Document;

/// Read/write contract of the corpus store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Every document carrying a present, non-placeholder dense vector
    async fn load_embedded(&self) -> Result<Vec<Document>>;

    /// Exact-match lookup by document id (`post::<id>` / `comment::<id>`)
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>>;

    /// Insert or replace documents by id, returning how many were written
    async fn upsert(&self, documents: &[Document]) -> Result<usize>;

    /// Documents whose dense vector is missing or still the zero placeholder
    async fn pending_embedding(&self, limit: usize) -> Result<Vec<Document>>;

    /// Create tables/collections if the backend needs them
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the store selected by `store.backend`
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Postgres => Arc::new(PostgresStore::from_config(config).await?),
        StoreBackend::Qdrant => Arc::new(QdrantStore::from_config(config)?),
        StoreBackend::File => Arc::new(MemoryStore::open(&config.store.snapshot_path).await?),
    };
    info!("Using {} document store", store.name());
    Ok(store)
}
