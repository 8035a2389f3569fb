//! Embedding generation handlers

use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::embeddings::backfill_embeddings;
use crate::embeddings::EmbeddingService;
use crate::embeddings::MAX_BATCH_SIZE;
use crate::store::open_store;
use crate::AppConfig;
use crate::Result;

/// Handle `embed`: backfill vectors for documents that have none yet
pub async fn handle_embed(config: &AppConfig, batch_size: usize) -> Result<()> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    print_info("🚀 Starting embeddings backfill...");
    println!(
        "   Provider: {:?} ({}), batch size {batch_size}",
        config.embeddings.provider, config.embeddings.endpoint
    );

    let store = open_store(config).await?;
    let embedding_service = EmbeddingService::new(config)?;
    if config.retrieval.use_hybrid && !embedding_service.supports_sparse() {
        print_warning("Encoder returns dense vectors only; hybrid scoring will use dense scores");
    }

    let stats = backfill_embeddings(store.as_ref(), &embedding_service, batch_size).await?;

    if stats.total == 0 {
        print_success("All documents already have embeddings");
        return Ok(());
    }

    println!();
    print_success(&format!(
        "Embedded {}/{} documents ({:.1}%)",
        stats.updated,
        stats.total,
        stats.success_rate()
    ));
    if stats.failed > 0 {
        print_warning(&format!(
            "{} documents failed; run `threadrag embed` again to retry",
            stats.failed
        ));
    }
    Ok(())
}
