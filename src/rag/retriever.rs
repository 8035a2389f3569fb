//! Query encoding, hybrid scoring and top-k selection over the corpus snapshot

use std::sync::Arc;

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::models::post_document_id;
use crate::models::ScoredDocument;
use crate::rag::cache::CorpusSnapshot;
use crate::rag::scorer::HybridScorer;
use crate::store::DocumentStore;

/// Score given to documents fetched by id rather than ranked
pub const LOOKUP_SCORE: f32 = 1.0;

/// Retriever for hybrid search over the cached corpus
pub struct Retriever {
    snapshot: Arc<CorpusSnapshot>,
    store: Arc<dyn DocumentStore>,
    embedding_service: Arc<EmbeddingService>,
    scorer: HybridScorer,
    default_top_k: usize,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(
        snapshot: Arc<CorpusSnapshot>,
        store: Arc<dyn DocumentStore>,
        embedding_service: Arc<EmbeddingService>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            snapshot,
            store,
            embedding_service,
            scorer: HybridScorer::new(config),
            default_top_k: config.top_k,
        }
    }

    pub fn snapshot(&self) -> &CorpusSnapshot {
        &self.snapshot
    }

    pub const fn scorer(&self) -> &HybridScorer {
        &self.scorer
    }

    pub const fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Retrieve the `top_k` (or configured default) best documents for a query
    ///
    /// # Errors
    /// - `EncodingFailure` / `Timeout` from the embedding provider
    /// - `DimensionMismatch` if the query vector does not match the corpus
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<ScoredDocument>> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        if self.snapshot.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        debug!("Retrieving top {} documents for: {}", top_k, query);

        let embedding = self.embedding_service.encode_query(query).await?;
        let query_sparse = if self.scorer.use_hybrid {
            embedding.sparse.as_ref()
        } else {
            None
        };

        let scores = self
            .scorer
            .score(&embedding.dense, query_sparse, &self.snapshot)?;
        let results: Vec<ScoredDocument> = self
            .scorer
            .rank(&scores.fused, top_k)
            .into_iter()
            .map(|position| {
                self.snapshot
                    .scored(position, scores.fused[position], Some(scores.dense[position]))
            })
            .collect();

        if let Some(best) = results.first() {
            debug!("Best match {} (score {:.3})", best.id, best.score);
        }
        Ok(results)
    }

    /// Fetch a post directly by its platform id, bypassing scoring.
    ///
    /// Looks in the snapshot first, then asks the store for posts added after
    /// the snapshot was taken. The score is [`LOOKUP_SCORE`] and must not be
    /// compared with ranked scores.
    pub async fn get_by_id(&self, post_id: &str) -> Result<Option<ScoredDocument>> {
        let document_id = post_document_id(post_id);

        if let Some(position) = self.snapshot.position(&document_id) {
            return Ok(Some(self.snapshot.scored(position, LOOKUP_SCORE, None)));
        }

        debug!("{} not in corpus snapshot, querying {} store", document_id, self.store.name());
        let found = self.store.find_by_id(&document_id).await?;
        Ok(found.map(|document| ScoredDocument {
            id: document.id,
            kind: document.kind,
            score: LOOKUP_SCORE,
            dense_score: None,
            text: document.text,
            source: document.source,
        }))
    }
}
