//! Backfill embeddings for stored documents

use std::collections::HashSet;

use tracing::info;
use tracing::warn;

use super::generator::EmbeddingService;
use crate::errors::Result;
use crate::store::DocumentStore;

/// Statistics from a backfill run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillStats {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

impl BackfillStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.updated as f64 / self.total as f64) * 100.0
    }
}

/// Embed every document whose vector is missing or still a zero placeholder.
///
/// A batch that fails to encode is counted as failed and not retried in the
/// same run.
pub async fn backfill_embeddings(
    store: &dyn DocumentStore,
    embedding_service: &EmbeddingService,
    batch_size: usize,
) -> Result<BackfillStats> {
    let batch_size = batch_size.max(1);
    info!("Starting embeddings backfill (batch size {batch_size})");

    let mut stats = BackfillStats::default();
    let mut failed_ids: HashSet<String> = HashSet::new();

    loop {
        let batch: Vec<_> = store
            .pending_embedding(batch_size + failed_ids.len())
            .await?
            .into_iter()
            .filter(|doc| !failed_ids.contains(&doc.id))
            .take(batch_size)
            .collect();
        if batch.is_empty() {
            break;
        }
        stats.total += batch.len();

        let texts: Vec<String> = batch.iter().map(|doc| doc.text.clone()).collect();
        let encoded = match embedding_service.encode(&texts).await {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to embed batch of {} documents: {}", batch.len(), e);
                stats.failed += batch.len();
                failed_ids.extend(batch.into_iter().map(|doc| doc.id));
                continue;
            }
        };

        let mut sparse = encoded.sparse.map(Vec::into_iter);
        let updated: Vec<_> = batch
            .into_iter()
            .zip(encoded.dense)
            .map(|(doc, dense)| {
                let sparse_vector = sparse.as_mut().and_then(Iterator::next);
                doc.with_embedding(dense, sparse_vector)
            })
            .collect();

        stats.updated += store.upsert(&updated).await?;
        info!("Embedded {} documents so far", stats.updated);
    }

    info!(
        "Backfill complete: {} updated, {} failed ({:.1}% success)",
        stats.updated,
        stats.failed,
        stats.success_rate()
    );
    Ok(stats)
}
