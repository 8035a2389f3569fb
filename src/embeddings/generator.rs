//! Embedding service: timeout-bounded, shape-checked access to an encoder

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use super::client::EmbeddingClient;
use super::EncodedBatch;
use super::Encoder;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::SparseVector;

/// Dense and optional sparse encoding of a single query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
}

/// Service wrapping an [`Encoder`] with a deadline and output validation
pub struct EmbeddingService {
    encoder: Arc<dyn Encoder>,
    dimension: Option<usize>,
    timeout: Duration,
}

impl EmbeddingService {
    /// Create a service backed by the configured HTTP provider
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = EmbeddingClient::new(&config.embeddings)?;
        Ok(Self::from_encoder(
            Arc::new(client),
            Some(config.embeddings.dimension),
            Duration::from_secs(config.embeddings.timeout_secs),
        ))
    }

    /// Create from any encoder; `dimension = None` accepts whatever length it returns
    pub fn from_encoder(
        encoder: Arc<dyn Encoder>,
        dimension: Option<usize>,
        timeout: Duration,
    ) -> Self {
        Self {
            encoder,
            dimension,
            timeout,
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn supports_sparse(&self) -> bool {
        self.encoder.supports_sparse()
    }

    /// Encode a batch of texts
    ///
    /// # Errors
    /// - `Timeout` when the provider does not answer in time
    /// - `EncodingFailure` when it fails or returns a batch of the wrong size
    /// - `DimensionMismatch` when a dense vector has the wrong length
    pub async fn encode(&self, texts: &[String]) -> Result<EncodedBatch> {
        if texts.is_empty() {
            return Ok(EncodedBatch::default());
        }

        let mut batch = tokio::time::timeout(self.timeout, self.encoder.encode(texts))
            .await
            .map_err(|_| ThreadRagError::Timeout {
                operation: "embedding request",
                seconds: self.timeout.as_secs(),
            })??;

        if batch.dense.len() != texts.len() {
            return Err(ThreadRagError::EncodingFailure(format!(
                "Encoder returned {} dense vectors for {} texts",
                batch.dense.len(),
                texts.len()
            )));
        }

        if let Some(expected) = self.dimension {
            if let Some((idx, vector)) = batch
                .dense
                .iter()
                .enumerate()
                .find(|(_, v)| v.len() != expected)
            {
                return Err(ThreadRagError::DimensionMismatch {
                    id: format!("encoded text #{idx}"),
                    expected,
                    found: vector.len(),
                });
            }
        }

        if batch
            .sparse
            .as_ref()
            .is_some_and(|sparse| sparse.len() != texts.len())
        {
            warn!("Encoder returned misaligned sparse vectors; ignoring them");
            batch.sparse = None;
        }

        debug!("Encoded {} texts", texts.len());
        Ok(batch)
    }

    /// Encode one query string (a batch of size 1)
    pub async fn encode_query(&self, query: &str) -> Result<QueryEmbedding> {
        let batch = self.encode(&[query.to_string()]).await?;
        let dense = batch
            .dense
            .into_iter()
            .next()
            .ok_or_else(|| ThreadRagError::EncodingFailure("No embedding in response".into()))?;
        let sparse = batch.sparse.and_then(|s| s.into_iter().next());
        Ok(QueryEmbedding { dense, sparse })
    }
}
