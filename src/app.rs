//! Application context built once at startup and shared by every request

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::config::AppConfig;
use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::llm::LlmService;
use crate::rag::AnsweringPolicy;
use crate::rag::CorpusCache;
use crate::rag::CorpusSnapshot;
use crate::rag::Retriever;
use crate::store::open_store;
use crate::store::DocumentStore;

static GLOBAL_CONTEXT: OnceCell<Arc<AppContext>> = OnceCell::const_new();

/// Everything a request handler needs, wired together once
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub retriever: Arc<Retriever>,
    pub llm: Arc<LlmService>,
    pub policy: AnsweringPolicy,
}

impl AppContext {
    /// Open the store, load the corpus snapshot and connect the providers.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Store connection errors
    /// - `EmptyCorpus` / `DimensionMismatch` while loading the snapshot
    pub async fn build(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config).await?;
        let embedding_service = Arc::new(EmbeddingService::new(&config)?);
        let llm = Arc::new(LlmService::new(&config)?);
        Self::from_parts(config, store, embedding_service, llm).await
    }

    /// Wire a context from already constructed collaborators
    pub async fn from_parts(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        embedding_service: Arc<EmbeddingService>,
        llm: Arc<LlmService>,
    ) -> Result<Self> {
        let snapshot = CorpusCache::new(
            store.clone(),
            config.retrieval.use_hybrid,
            embedding_service.dimension(),
        )
        .load()
        .await?;
        Ok(Self::with_snapshot(config, store, embedding_service, llm, snapshot))
    }

    pub fn with_snapshot(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        embedding_service: Arc<EmbeddingService>,
        llm: Arc<LlmService>,
        snapshot: CorpusSnapshot,
    ) -> Self {
        let retriever = Arc::new(Retriever::new(
            Arc::new(snapshot),
            store.clone(),
            embedding_service,
            &config.retrieval,
        ));
        let policy = AnsweringPolicy::new(retriever.clone(), llm.clone(), &config);
        info!(
            "Application context ready ({} documents, answer threshold {:.2})",
            retriever.snapshot().len(),
            policy.min_confidence()
        );

        Self {
            config,
            store,
            retriever,
            llm,
            policy,
        }
    }

    /// The process-wide context, built on first use.
    ///
    /// Concurrent first callers wait on the same initialization; a failed
    /// build is not cached and the next caller tries again.
    pub async fn global(config: &AppConfig) -> Result<Arc<Self>> {
        Self::get_or_build(&GLOBAL_CONTEXT, config).await
    }

    async fn get_or_build(cell: &OnceCell<Arc<Self>>, config: &AppConfig) -> Result<Arc<Self>> {
        cell.get_or_try_init(|| async { Self::build(config.clone()).await.map(Arc::new) })
            .await
            .cloned()
    }
}
