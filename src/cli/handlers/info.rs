//! Information display handlers

use crate::cli::output::print_config;
use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::models::DocumentKind;
use crate::store::open_store;
use crate::store::DocumentStore;
use crate::AppConfig;
use crate::Result;

/// Handle config command
pub async fn handle_config_command(config: &AppConfig) -> Result<()> {
    print_config(config);
    Ok(())
}

/// Document counts for one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub embedded: usize,
    pub pending: usize,
}

impl KindCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.embedded + self.pending
    }
}

/// What the document store currently holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatus {
    pub posts: KindCounts,
    pub comments: KindCounts,
}

impl StoreStatus {
    #[must_use]
    pub fn total(&self) -> usize {
        self.posts.total() + self.comments.total()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.posts.pending + self.comments.pending
    }

    #[must_use]
    pub fn embedded(&self) -> usize {
        self.posts.embedded + self.comments.embedded
    }

    fn counts_mut(&mut self, kind: DocumentKind) -> &mut KindCounts {
        match kind {
            DocumentKind::Post => &mut self.posts,
            DocumentKind::Comment => &mut self.comments,
        }
    }
}

/// Count stored documents by kind and embedding state
pub async fn collect_status(store: &dyn DocumentStore) -> Result<StoreStatus> {
    store.ensure_schema().await?;

    let embedded = store.load_embedded().await?;
    let pending = store.pending_embedding(usize::MAX).await?;

    let mut status = StoreStatus::default();
    for doc in &embedded {
        status.counts_mut(doc.kind).embedded += 1;
    }
    for doc in &pending {
        status.counts_mut(doc.kind).pending += 1;
    }
    Ok(status)
}

/// Handle `status`: check the store is reachable and report embedding progress
pub async fn handle_status_command(config: &AppConfig) -> Result<()> {
    print_info("🔍 Checking document store...");
    let store = open_store(config).await?;
    let status = collect_status(store.as_ref()).await?;
    print_success(&format!("Connected to {} store", store.name()));

    println!();
    println!("   {:<10} {:>10} {:>10}", "Kind", "Embedded", "Pending");
    println!("   {:<10} {:>10} {:>10}", "post", status.posts.embedded, status.posts.pending);
    println!(
        "   {:<10} {:>10} {:>10}",
        "comment", status.comments.embedded, status.comments.pending
    );
    println!();

    if status.total() == 0 {
        print_warning("The store is empty; run `threadrag ingest` to load posts and comments");
    } else if status.pending() > 0 {
        print_warning(&format!(
            "{} documents have no embedding yet; run `threadrag embed`",
            status.pending()
        ));
    } else {
        print_success(&format!("All {} documents are embedded", status.embedded()));
    }
    Ok(())
}
