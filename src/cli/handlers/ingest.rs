//! Crawl export ingestion handler

use std::path::Path;

use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::errors::ThreadRagError;
use crate::ingest::ingest_files;
use crate::store::open_store;
use crate::AppConfig;
use crate::Result;

/// Handle `ingest --posts <file> --comments <file>`
pub async fn handle_ingest(
    config: &AppConfig,
    posts: Option<&Path>,
    comments: Option<&Path>,
) -> Result<()> {
    if posts.is_none() && comments.is_none() {
        return Err(ThreadRagError::InvalidRequest(
            "Nothing to ingest: pass --posts and/or --comments".to_string(),
        ));
    }

    print_info("📥 Ingesting crawled posts and comments...");
    let store = open_store(config).await?;
    let stats = ingest_files(store.as_ref(), posts, comments).await?;

    print_success(&format!(
        "Stored {} posts and {} comments ({} unchanged)",
        stats.posts, stats.comments, stats.unchanged
    ));
    if stats.skipped > 0 {
        print_warning(&format!("Skipped {} comments without a post_id", stats.skipped));
    }
    if stats.total() > stats.unchanged {
        print_info("💡 Run `threadrag embed` to generate vectors for new documents");
    }
    Ok(())
}
