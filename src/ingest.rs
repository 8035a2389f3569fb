//! Turn crawled posts and comments into documents awaiting embeddings

use std::path::Path;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::Document;
use crate::models::RawComment;
use crate::models::RawPost;
use crate::store::DocumentStore;

/// Counts from one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub posts: usize,
    pub comments: usize,
    pub skipped: usize,
    /// Documents whose text is unchanged and keep their existing vectors
    pub unchanged: usize,
}

impl IngestStats {
    pub const fn total(&self) -> usize {
        self.posts + self.comments
    }
}

/// Epoch values above this are milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Timestamps arrive as strings or epoch numbers depending on the exporter.
/// Strings are kept as written; epoch numbers become RFC 3339 in UTC.
fn timestamp(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => {
            let epoch = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            let parsed = if epoch.abs() >= MILLIS_THRESHOLD {
                DateTime::<Utc>::from_timestamp_millis(epoch)
            } else {
                DateTime::<Utc>::from_timestamp(epoch, 0)
            };
            parsed.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        other => Some(other.to_string()),
    }
}

pub fn post_to_document(post: RawPost) -> Document {
    let mut document = Document::post(&post.id, post.message.as_deref(), post.permalink_url);
    document.created_time = timestamp(post.created_time);
    document.fetched_at = timestamp(post.fetched_at);
    document
}

/// `None` when the comment does not say which post it belongs to
pub fn comment_to_document(comment: RawComment) -> Option<Document> {
    let post_id = comment.post_id.filter(|id| !id.trim().is_empty())?;
    let mut document = Document::comment(
        &comment.id,
        &post_id,
        comment.message.as_deref(),
        comment.permalink_url,
    );
    document.created_time = timestamp(comment.created_time);
    document.fetched_at = timestamp(comment.fetched_at);
    Some(document)
}

/// Parse a JSON Lines file, skipping blank lines
pub async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_jsonl(&content, path)
}

fn parse_jsonl<T: DeserializeOwned>(content: &str, path: &Path) -> Result<Vec<T>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                ThreadRagError::InvalidRequest(format!("{}:{}: {e}", path.display(), idx + 1))
            })
        })
        .collect()
}

/// Convert crawl records to documents; comments without a post are skipped
pub fn build_documents(posts: Vec<RawPost>, comments: Vec<RawComment>) -> (Vec<Document>, IngestStats) {
    let mut stats = IngestStats {
        posts: posts.len(),
        ..IngestStats::default()
    };
    let mut documents: Vec<Document> = posts.into_iter().map(post_to_document).collect();

    for comment in comments {
        let comment_id = comment.id.clone();
        match comment_to_document(comment) {
            Some(document) => {
                stats.comments += 1;
                documents.push(document);
            }
            None => {
                warn!("Skipping comment {} without post_id", comment_id);
                stats.skipped += 1;
            }
        }
    }

    (documents, stats)
}

/// Read crawl exports and write them to the store.
///
/// A document whose text has not changed keeps the vectors already stored
/// for it, so re-ingesting does not force a full re-embedding.
pub async fn ingest_files(
    store: &dyn DocumentStore,
    posts_path: Option<&Path>,
    comments_path: Option<&Path>,
) -> Result<IngestStats> {
    let posts: Vec<RawPost> = match posts_path {
        Some(path) => read_jsonl(path).await?,
        None => Vec::new(),
    };
    let comments: Vec<RawComment> = match comments_path {
        Some(path) => read_jsonl(path).await?,
        None => Vec::new(),
    };
    info!("Read {} posts and {} comments", posts.len(), comments.len());

    // Lookups below need the table/collection to exist on a fresh store
    store.ensure_schema().await?;

    let (mut documents, mut stats) = build_documents(posts, comments);
    for document in &mut documents {
        if let Some(existing) = store.find_by_id(&document.id).await? {
            if existing.text == document.text && existing.has_embedding() {
                document.dense_vector = existing.dense_vector;
                document.sparse_vector = existing.sparse_vector;
                stats.unchanged += 1;
            }
        }
    }

    let written = store.upsert(&documents).await?;
    info!(
        "Ingested {} documents into {} store ({} unchanged, {} skipped)",
        written,
        store.name(),
        stats.unchanged,
        stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::models::DocumentKind;
    use crate::models::NO_MESSAGE;
    use crate::store::MemoryStore;

    /// Store that rejects every read until its schema has been created
    #[derive(Default)]
    struct UninitializedStore {
        initialized: AtomicBool,
        written: Mutex<Vec<Document>>,
    }

    impl UninitializedStore {
        fn check(&self) -> Result<()> {
            if self.initialized.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ThreadRagError::Store("relation \"knowledge_base\" does not exist".into()))
            }
        }
    }

    #[async_trait]
    impl DocumentStore for UninitializedStore {
        fn name(&self) -> &'static str {
            "uninitialized"
        }

        async fn load_embedded(&self) -> Result<Vec<Document>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Document>> {
            self.check()?;
            Ok(None)
        }

        async fn upsert(&self, documents: &[Document]) -> Result<usize> {
            self.check()?;
            self.written.lock().unwrap().extend_from_slice(documents);
            Ok(documents.len())
        }

        async fn pending_embedding(&self, _limit: usize) -> Result<Vec<Document>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn ensure_schema(&self) -> Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_post_conversion() {
        let post: RawPost = serde_json::from_value(json!({
            "_id": "123_456",
            "message": "  Midterm moved to Friday  ",
            "permalink_url": "https://fb.com/123_456",
            "created_time": "2024-03-01T10:00:00+0000",
            "fetched_at": 1709290000
        }))
        .unwrap();

        let document = post_to_document(post);
        assert_eq!(document.id, "post::123_456");
        assert_eq!(document.kind, DocumentKind::Post);
        assert_eq!(document.text, "Midterm moved to Friday");
        assert_eq!(document.created_time.as_deref(), Some("2024-03-01T10:00:00+0000"));
        assert_eq!(document.fetched_at.as_deref(), Some("2024-03-01T10:46:40Z"));
        assert!(!document.has_embedding());
    }

    #[test]
    fn test_millisecond_epoch_timestamp() {
        assert_eq!(
            timestamp(Some(json!(1_709_290_000_000_i64))).as_deref(),
            Some("2024-03-01T10:46:40Z")
        );
        assert_eq!(timestamp(Some(json!(""))), None);
    }

    #[test]
    fn test_blank_comment_gets_placeholder() {
        let comment = RawComment {
            id: "c1".into(),
            post_id: Some("p1".into()),
            message: Some("   ".into()),
            permalink_url: None,
            created_time: None,
            fetched_at: Some(Value::Null),
        };
        let document = comment_to_document(comment).unwrap();
        assert_eq!(document.text, NO_MESSAGE);
        assert_eq!(document.source.post_id, "p1");
        assert_eq!(document.source.comment_id.as_deref(), Some("c1"));
        assert!(document.fetched_at.is_none());
    }

    #[test]
    fn test_orphan_comments_are_skipped() {
        let comments = vec![
            RawComment {
                id: "c1".into(),
                post_id: None,
                message: Some("hi".into()),
                permalink_url: None,
                created_time: None,
                fetched_at: None,
            },
            RawComment {
                id: "c2".into(),
                post_id: Some("p1".into()),
                message: Some("hello".into()),
                permalink_url: None,
                created_time: None,
                fetched_at: None,
            },
        ];
        let (documents, stats) = build_documents(Vec::new(), comments);
        assert_eq!(documents.len(), 1);
        assert_eq!(stats.comments, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_parse_jsonl_reports_line() {
        let path = PathBuf::from("posts.jsonl");
        let err = parse_jsonl::<RawPost>("{\"id\":\"1\"}\n\nnot json\n", &path).unwrap_err();
        assert!(err.to_string().contains("posts.jsonl:3"));
    }

    #[tokio::test]
    async fn test_ingest_keeps_vectors_of_unchanged_documents() {
        let dir = tempfile::tempdir().unwrap();
        let posts_path = dir.path().join("posts.jsonl");
        tokio::fs::write(
            &posts_path,
            "{\"id\":\"1\",\"message\":\"same text\"}\n{\"id\":\"2\",\"message\":\"edited\"}\n",
        )
        .await
        .unwrap();

        let store = MemoryStore::new(vec![
            Document::post("1", Some("same text"), None).with_embedding(vec![0.1, 0.2], None),
            Document::post("2", Some("original"), None).with_embedding(vec![0.3, 0.4], None),
        ]);

        let stats = ingest_files(&store, Some(&posts_path), None).await.unwrap();
        assert_eq!(stats.posts, 2);
        assert_eq!(stats.unchanged, 1);

        let pending = store.pending_embedding(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "post::2");
    }

    #[tokio::test]
    async fn test_first_ingest_creates_schema_before_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let posts_path = dir.path().join("posts.jsonl");
        tokio::fs::write(&posts_path, "{\"id\":\"1\",\"message\":\"welcome\"}\n")
            .await
            .unwrap();

        let store = UninitializedStore::default();
        let stats = ingest_files(&store, Some(&posts_path), None).await.unwrap();

        assert_eq!(stats.posts, 1);
        assert_eq!(stats.unchanged, 0);
        let written = store.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id, "post::1");
    }
}
