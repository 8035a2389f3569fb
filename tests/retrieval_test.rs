use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use threadrag::app::AppContext;
use threadrag::embeddings::backfill_embeddings;
use threadrag::embeddings::EmbeddingService;
use threadrag::embeddings::EncodedBatch;
use threadrag::embeddings::Encoder;
use threadrag::ingest::ingest_files;
use threadrag::llm::Generator;
use threadrag::llm::LlmService;
use threadrag::models::Document;
use threadrag::models::SparseVector;
use threadrag::rag::NO_DATA_ANSWER;
use threadrag::store::DocumentStore;
use threadrag::store::MemoryStore;
use threadrag::AppConfig;
use threadrag::Result;

const VOCABULARY: [&str; 5] = ["database", "exam", "football", "cafeteria", "lab"];

/// Bag-of-keywords encoder with a small bias dimension so no vector is all zero
struct KeywordEncoder {
    sparse: bool,
    calls: AtomicUsize,
}

impl KeywordEncoder {
    fn new(sparse: bool) -> Arc<Self> {
        Arc::new(Self {
            sparse,
            calls: AtomicUsize::new(0),
        })
    }

    fn counts(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Encoder for KeywordEncoder {
    async fn encode(&self, texts: &[String]) -> Result<EncodedBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let counts: Vec<Vec<f32>> = texts.iter().map(|text| Self::counts(text)).collect();
        let dense = counts
            .iter()
            .map(|c| {
                let mut vector = c.clone();
                vector.push(0.01);
                vector
            })
            .collect();
        let sparse = self.sparse.then(|| {
            counts
                .iter()
                .map(|c| {
                    c.iter()
                        .enumerate()
                        .filter(|(_, weight)| **weight > 0.0)
                        .map(|(term, weight)| (term as u32, *weight))
                        .collect::<SparseVector>()
                })
                .collect()
        });
        Ok(EncodedBatch { dense, sparse })
    }

    fn supports_sparse(&self) -> bool {
        self.sparse
    }
}

struct RecordingGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

const POSTS: &str = r#"{"id":"P1","message":"Database exam moved to Friday","permalink_url":"https://fb.com/P1"}
{"id":"P2","message":"Football match this weekend","permalink_url":"https://fb.com/P2"}
"#;

const COMMENTS: &str = r#"{"id":"C1","post_id":"P1","message":"Is the exam open book?","permalink_url":"https://fb.com/C1"}
{"id":"C2","post_id":"P1","message":"Yes, open book"}
{"id":"C5","post_id":"P1","message":"   "}
{"id":"C3","post_id":"P3","message":"Lab lab deadline extended","permalink_url":"https://fb.com/C3"}
{"id":"C4","message":"orphan without a post"}
"#;

async fn write_exports(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let posts = dir.join("posts.jsonl");
    let comments = dir.join("comments.jsonl");
    tokio::fs::write(&posts, POSTS).await.unwrap();
    tokio::fs::write(&comments, COMMENTS).await.unwrap();
    (posts, comments)
}

struct Harness {
    context: AppContext,
    store: Arc<MemoryStore>,
    encoder: Arc<KeywordEncoder>,
    generator: Arc<RecordingGenerator>,
}

/// Ingest the exports, embed them and build the application context
async fn harness(config: AppConfig, sparse: bool, reply: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let (posts, comments) = write_exports(dir.path()).await;

    let store = Arc::new(MemoryStore::new(Vec::new()));
    let stats = ingest_files(store.as_ref(), Some(&posts), Some(&comments))
        .await
        .unwrap();
    assert_eq!(stats.posts, 2);
    assert_eq!(stats.comments, 4);
    assert_eq!(stats.skipped, 1);

    let encoder = KeywordEncoder::new(sparse);
    let embedding_service = Arc::new(EmbeddingService::from_encoder(
        encoder.clone(),
        Some(VOCABULARY.len() + 1),
        Duration::from_secs(5),
    ));
    let backfill = backfill_embeddings(store.as_ref(), &embedding_service, 2)
        .await
        .unwrap();
    assert_eq!(backfill.updated, 6);
    assert_eq!(backfill.failed, 0);

    let generator = RecordingGenerator::new(reply);
    let llm = Arc::new(LlmService::from_generator(
        generator.clone(),
        Duration::from_secs(5),
    ));
    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let context = AppContext::from_parts(config, dyn_store, embedding_service, llm)
        .await
        .unwrap();

    Harness {
        context,
        store,
        encoder,
        generator,
    }
}

#[tokio::test]
async fn test_post_question_uses_post_and_comments() {
    let h = harness(AppConfig::default(), false, "The exam is on Friday.").await;

    let response = h
        .context
        .policy
        .answer("When is the database exam?")
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.answer, "The exam is on Friday.");
    assert_eq!(response.sources[0].link, "https://fb.com/P1");
    assert!(response.sources.iter().all(|s| !s.link.is_empty()));

    let prompt = h.generator.last_prompt();
    assert!(prompt.contains(
        "=== POST ===\ntext: Database exam moved to Friday\nsource: https://fb.com/P1"
    ));
    assert!(prompt.contains("=== COMMENTS ===\nComment 1: Is the exam open book?\nComment 2: Yes, open book"));
    assert!(!prompt.contains("[NO_MESSAGE]"));
    assert!(prompt.contains("When is the database exam?"));
    assert_eq!(h.generator.calls(), 1);
}

#[tokio::test]
async fn test_high_min_score_returns_canned_answer_without_generation() {
    let mut config = AppConfig::default();
    config.retrieval.min_score = Some(0.9);
    let h = harness(config, false, "should not be used").await;

    let response = h.context.policy.answer("cafeteria opening hours").await.unwrap();

    assert!(response.success);
    assert_eq!(response.answer, NO_DATA_ANSWER);
    assert!(response.sources.is_empty());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_comment_hit_anchors_on_post_looked_up_in_store() {
    let h = harness(AppConfig::default(), false, "It was extended.").await;

    // Parent post arrives after the snapshot was loaded and has no vector yet
    h.store
        .upsert(&[Document::post(
            "P3",
            Some("Lab report deadline"),
            Some("https://fb.com/P3".to_string()),
        )])
        .await
        .unwrap();

    let response = h.context.policy.answer("lab deadline").await.unwrap();

    assert_eq!(response.answer, "It was extended.");
    assert_eq!(response.sources[0].link, "https://fb.com/P3");
    assert_eq!(response.sources[1].link, "https://fb.com/C3");

    let prompt = h.generator.last_prompt();
    assert!(prompt.contains("=== POST ===\ntext: Lab report deadline\nsource: https://fb.com/P3"));
    assert!(prompt.contains("Comment 1: Lab lab deadline extended"));
}

#[tokio::test]
async fn test_retrieval_is_idempotent_and_bounded() {
    let h = harness(AppConfig::default(), false, "unused").await;
    let retriever = &h.context.retriever;

    let first = retriever.retrieve("database exam", Some(3)).await.unwrap();
    let second = retriever.retrieve("database exam", Some(3)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].id, "post::P1");

    let all = retriever.retrieve("database exam", Some(50)).await.unwrap();
    assert_eq!(all.len(), 6);
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

    // One encoder call per backfill batch (3) plus one per query (3)
    assert_eq!(h.encoder.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_hybrid_scores_stay_in_unit_range() {
    let h = harness(AppConfig::default(), true, "unused").await;
    assert!(h.context.retriever.snapshot().sparse().is_some());

    let results = h
        .context
        .retriever
        .retrieve("football", None)
        .await
        .unwrap();

    assert_eq!(results[0].id, "post::P2");
    assert!((results[0].score - 1.0).abs() < 1e-4);
    assert!(results.iter().all(|r| (0.0..=1.0 + 1e-5).contains(&r.score)));
}
