//! Answering policy: Retrieve -> Gate -> Assemble -> Generate

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::llm::LlmService;
use crate::models::truncate_str;
use crate::models::ScoredDocument;
use crate::models::SourceLink;
use crate::rag::prompts::build_answer_prompt;
use crate::rag::ContextAssembler;
use crate::rag::Retriever;

/// Canned answer when the corpus cannot support a response
pub const NO_DATA_ANSWER: &str = "There is currently no data to answer this question.";

/// Model answers that mean "nothing found" (compared trimmed, case-insensitively)
const NO_INFORMATION_PHRASES: &[&str] = &["unknown", "no information", "not found", "i don't know"];

/// Response to a question, as returned by the HTTP and CLI shells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<SourceLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn answered(answer: String, sources: Vec<SourceLink>) -> Self {
        Self {
            success: true,
            answer,
            sources,
            error: None,
        }
    }

    /// The canned "insufficient data" response with no sources
    pub fn no_data() -> Self {
        Self::answered(NO_DATA_ANSWER.to_string(), Vec::new())
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: String::new(),
            sources: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.success && self.answer == NO_DATA_ANSWER && self.sources.is_empty()
    }
}

/// Decides whether a question can be answered and produces the answer
pub struct AnsweringPolicy {
    retriever: Arc<Retriever>,
    llm_service: Arc<LlmService>,
    context_assembler: ContextAssembler,
    min_confidence: f32,
    snippet_chars: usize,
}

impl AnsweringPolicy {
    /// Create a policy from the `[answer]` and `[retrieval]` settings.
    ///
    /// The confidence gate is the stricter of `answer.min_confidence` and
    /// `retrieval.min_score`, so best-effort results returned below the
    /// retrieval floor are never answered from.
    pub fn new(retriever: Arc<Retriever>, llm_service: Arc<LlmService>, config: &AppConfig) -> Self {
        let min_confidence = config
            .retrieval
            .min_score
            .map_or(config.answer.min_confidence, |floor| {
                floor.max(config.answer.min_confidence)
            });

        Self {
            retriever,
            llm_service,
            context_assembler: ContextAssembler::new(config.answer.max_context_chars),
            min_confidence,
            snippet_chars: config.answer.snippet_chars,
        }
    }

    pub const fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer a question.
    ///
    /// # Errors
    /// - `InvalidRequest` for a blank question; nothing is retrieved or generated
    ///
    /// Retrieval failures come back as an unsuccessful [`ChatResponse`];
    /// generation failures come back as answer text.
    pub async fn answer(&self, question: &str) -> Result<ChatResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ThreadRagError::InvalidRequest("Question is required".to_string()));
        }
        info!("Processing question: {}", question);

        let documents = match self.retriever.retrieve(question, None).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                return Ok(ChatResponse::failure(e.to_string()));
            }
        };

        Ok(self.answer_from(question, &documents).await)
    }

    /// Apply the policy to an already ranked result list
    pub async fn answer_from(&self, question: &str, documents: &[ScoredDocument]) -> ChatResponse {
        let Some(top) = documents.first() else {
            debug!("No documents retrieved");
            return ChatResponse::no_data();
        };
        if top.score < self.min_confidence {
            debug!(
                "Top score {:.3} below threshold {:.3}",
                top.score, self.min_confidence
            );
            return ChatResponse::no_data();
        }

        let anchor = self.resolve_anchor(top, documents).await;
        let context = match &anchor {
            Some(post) => self
                .context_assembler
                .build_post_context(post, self.retriever.snapshot().comment_index()),
            None => {
                warn!("No anchor post for {}; answering from its text only", top.id);
                self.context_assembler.build_text_context(top)
            }
        };

        let prompt = build_answer_prompt(question, &context);
        let raw_answer = self.llm_service.generate_or_degrade(&prompt).await;
        let answer = if is_no_information(&raw_answer) {
            NO_DATA_ANSWER.to_string()
        } else {
            raw_answer.trim().to_string()
        };

        let sources = self.collect_sources(anchor.as_ref(), documents);
        ChatResponse::answered(answer, sources)
    }

    /// The post that centers the context: the top document itself, the
    /// parent post among the retrieved documents, or the parent post looked up
    /// by id
    async fn resolve_anchor(
        &self,
        top: &ScoredDocument,
        documents: &[ScoredDocument],
    ) -> Option<ScoredDocument> {
        if top.is_post() {
            return Some(top.clone());
        }

        let post_id = top.source.post_id.as_str();
        if post_id.is_empty() {
            return None;
        }

        if let Some(post) = documents
            .iter()
            .find(|doc| doc.is_post() && doc.source.post_id == post_id)
        {
            return Some(post.clone());
        }

        match self.retriever.get_by_id(post_id).await {
            Ok(post) => post,
            Err(e) => {
                warn!("Failed to look up post {}: {}", post_id, e);
                None
            }
        }
    }

    /// Anchor link first, then every other retrieved document with a link
    fn collect_sources(
        &self,
        anchor: Option<&ScoredDocument>,
        documents: &[ScoredDocument],
    ) -> Vec<SourceLink> {
        let anchor_id = anchor.map(|post| post.id.as_str());

        anchor
            .into_iter()
            .chain(
                documents
                    .iter()
                    .filter(|doc| Some(doc.id.as_str()) != anchor_id),
            )
            .filter_map(|doc| {
                doc.source.link().map(|link| SourceLink {
                    link: link.to_string(),
                    text: truncate_str(&doc.text, self.snippet_chars),
                })
            })
            .collect()
    }
}

/// Blank answers and answers equivalent to "no information"
pub fn is_no_information(answer: &str) -> bool {
    let normalized = answer.trim().to_lowercase();
    normalized.is_empty()
        || normalized == NO_DATA_ANSWER.to_lowercase()
        || NO_INFORMATION_PHRASES
            .iter()
            .any(|phrase| normalized.trim_end_matches('.') == *phrase)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::embeddings::EmbeddingService;
    use crate::embeddings::EncodedBatch;
    use crate::embeddings::Encoder;
    use crate::llm::Generator;
    use crate::models::Document;
    use crate::models::DocumentKind;
    use crate::models::SourceMeta;
    use crate::rag::CorpusSnapshot;
    use crate::store::MemoryStore;

    struct AxisEncoder;

    #[async_trait]
    impl Encoder for AxisEncoder {
        async fn encode(&self, texts: &[String]) -> Result<EncodedBatch> {
            Ok(EncodedBatch {
                dense: texts.iter().map(|_| vec![1.0, 0.0]).collect(),
                sparse: None,
            })
        }
    }

    struct RecordingGenerator {
        reply: String,
        prompts: std::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            Ok(self.reply.clone())
        }
    }

    fn policy(reply: &str, store_documents: Vec<Document>) -> (AnsweringPolicy, Arc<RecordingGenerator>) {
        let documents = vec![
            Document::post("P1", Some("lecture on databases"), Some("https://fb.com/P1".into()))
                .with_embedding(vec![1.0, 0.0], None),
            Document::comment("C1", "P1", Some("great class"), Some("https://fb.com/C1".into()))
                .with_embedding(vec![0.9, 0.1], None),
        ];
        let config = AppConfig::default();
        let snapshot = CorpusSnapshot::from_documents(documents, false, None).unwrap();
        let encoder = EmbeddingService::from_encoder(Arc::new(AxisEncoder), Some(2), Duration::from_secs(1));
        let retriever = Retriever::new(
            Arc::new(snapshot),
            Arc::new(MemoryStore::new(store_documents)),
            Arc::new(encoder),
            &config.retrieval,
        );
        let generator = Arc::new(RecordingGenerator {
            reply: reply.to_string(),
            prompts: std::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let llm = LlmService::from_generator(generator.clone(), Duration::from_secs(1));
        (
            AnsweringPolicy::new(Arc::new(retriever), Arc::new(llm), &config),
            generator,
        )
    }

    fn scored(id: &str, kind: DocumentKind, post_id: &str, score: f32, link: Option<&str>) -> ScoredDocument {
        ScoredDocument {
            id: id.to_string(),
            kind,
            score,
            dense_score: Some(score),
            text: format!("text of {id}"),
            source: SourceMeta {
                post_id: post_id.to_string(),
                comment_id: (kind == DocumentKind::Comment).then(|| id.to_string()),
                permalink_url: link.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_no_information_phrases() {
        assert!(is_no_information(""));
        assert!(is_no_information("  Unknown. "));
        assert!(is_no_information("I don't know"));
        assert!(is_no_information(NO_DATA_ANSWER));
        assert!(!is_no_information("The exam is unknown to most students but it is on Friday."));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let (policy, generator) = policy("ok", Vec::new());
        let err = policy.answer("   ").await.unwrap_err();
        assert!(matches!(err, ThreadRagError::InvalidRequest(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_low_score_skips_generation() {
        let (policy, generator) = policy("ok", Vec::new());
        let low = vec![scored("post::P1", DocumentKind::Post, "P1", 0.29, Some("https://x"))];

        let response = policy.answer_from("q", &low).await;
        assert!(response.is_no_data());
        assert!(policy.answer_from("q", &[]).await.is_no_data());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_post_anchor_context_and_sources() {
        let (policy, generator) = policy("Databases are taught on Monday.", Vec::new());
        let response = policy.answer("when is the database lecture?").await.unwrap();

        assert!(response.success);
        assert_eq!(response.answer, "Databases are taught on Monday.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].link, "https://fb.com/P1");
        assert_eq!(response.sources[1].link, "https://fb.com/C1");

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("text: lecture on databases"));
        assert!(prompts[0].contains("Comment 1: great class"));
    }

    #[tokio::test]
    async fn test_comment_anchor_found_in_results() {
        let (policy, generator) = policy("answer", Vec::new());
        let docs = vec![
            scored("comment::C7", DocumentKind::Comment, "P5", 0.9, None),
            scored("post::P5", DocumentKind::Post, "P5", 0.5, Some("https://fb.com/P5")),
        ];

        let response = policy.answer_from("q", &docs).await;
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].link, "https://fb.com/P5");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("text: text of post::P5"));
    }

    #[tokio::test]
    async fn test_comment_anchor_resolved_by_lookup() {
        let late_post = Document::post("P8", Some("exam moved to Friday"), Some("https://fb.com/P8".into()));
        let (policy, generator) = policy("answer", vec![late_post]);
        let docs = vec![scored("comment::C8", DocumentKind::Comment, "P8", 0.9, Some("https://fb.com/C8"))];

        let response = policy.answer_from("q", &docs).await;
        assert_eq!(response.sources[0].link, "https://fb.com/P8");
        assert_eq!(response.sources[1].link, "https://fb.com/C8");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("=== POST ===\ntext: exam moved to Friday"));
    }

    #[tokio::test]
    async fn test_unresolvable_anchor_degrades_to_top_text() {
        let (policy, generator) = policy("answer", Vec::new());
        let docs = vec![scored("comment::C9", DocumentKind::Comment, "P404", 0.9, None)];

        let response = policy.answer_from("q", &docs).await;
        assert!(response.success);
        assert!(response.sources.is_empty());
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("=== CONTEXT ===\ntext: text of comment::C9\nsource: \n"));
        assert!(!prompts[0].contains("=== POST ===\ntext:"));
    }

    #[tokio::test]
    async fn test_no_information_answer_is_replaced() {
        let (policy, _) = policy("  Not found. ", Vec::new());
        let response = policy.answer("anything").await.unwrap();
        assert_eq!(response.answer, NO_DATA_ANSWER);
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_snippets_are_truncated() {
        let (policy, _) = policy("answer", Vec::new());
        let mut long = scored("post::P1", DocumentKind::Post, "P1", 0.9, Some("https://fb.com/P1"));
        long.text = "x".repeat(250);

        let response = policy.answer_from("q", &[long]).await;
        assert_eq!(response.sources[0].text.chars().count(), 203);
        assert!(response.sources[0].text.ends_with("..."));
    }
}
