//! In-memory corpus snapshot loaded once at startup

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::CommentRef;
use crate::models::Document;
use crate::models::DocumentKind;
use crate::models::ScoredDocument;
use crate::models::SourceMeta;
use crate::models::SparseVector;
use crate::store::DocumentStore;

/// `post_id -> comments attached to that post`, in corpus order
pub type CommentIndex = HashMap<String, Vec<CommentRef>>;

/// Immutable corpus held as parallel arrays indexed by position.
///
/// Dense vectors live in one flat buffer of `len * dimension` floats.
#[derive(Debug)]
pub struct CorpusSnapshot {
    ids: Vec<String>,
    kinds: Vec<DocumentKind>,
    texts: Vec<String>,
    sources: Vec<SourceMeta>,
    dense: Vec<f32>,
    norms: Vec<f32>,
    /// `None` when hybrid scoring is disabled
    sparse: Option<Vec<SparseVector>>,
    dimension: usize,
    positions: HashMap<String, usize>,
    comments_by_post: CommentIndex,
}

impl CorpusSnapshot {
    /// Build a snapshot from embedded documents.
    ///
    /// # Errors
    /// - `EmptyCorpus` if no document carries a real embedding
    /// - `DimensionMismatch` if a vector length differs from `expected_dim`
    ///   (or, when unset, from the first document)
    pub fn from_documents(
        documents: Vec<Document>,
        use_hybrid: bool,
        expected_dim: Option<usize>,
    ) -> Result<Self> {
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(Document::has_embedding)
            .collect();
        let Some(first) = documents.first() else {
            return Err(ThreadRagError::EmptyCorpus);
        };
        let dimension = expected_dim.unwrap_or(first.dense_vector.len());

        let capacity = documents.len();
        let mut snapshot = Self {
            ids: Vec::with_capacity(capacity),
            kinds: Vec::with_capacity(capacity),
            texts: Vec::with_capacity(capacity),
            sources: Vec::with_capacity(capacity),
            dense: Vec::with_capacity(capacity * dimension),
            norms: Vec::with_capacity(capacity),
            sparse: use_hybrid.then(|| Vec::with_capacity(capacity)),
            dimension,
            positions: HashMap::with_capacity(capacity),
            comments_by_post: CommentIndex::new(),
        };

        for document in documents {
            if document.dense_vector.len() != dimension {
                return Err(ThreadRagError::DimensionMismatch {
                    id: document.id,
                    expected: dimension,
                    found: document.dense_vector.len(),
                });
            }
            if snapshot.positions.contains_key(&document.id) {
                warn!("Duplicate document id {}; keeping the first copy", document.id);
                continue;
            }
            snapshot.push(document);
        }

        Ok(snapshot)
    }

    fn push(&mut self, document: Document) {
        let position = self.ids.len();

        if document.kind == DocumentKind::Comment && !document.source.post_id.is_empty() {
            self.comments_by_post
                .entry(document.source.post_id.clone())
                .or_default()
                .push(CommentRef {
                    text: document.text.clone(),
                    comment_id: document.source.comment_id.clone(),
                });
        }

        let norm = document
            .dense_vector
            .iter()
            .map(|v| v * v)
            .sum::<f32>()
            .sqrt();
        self.dense.extend_from_slice(&document.dense_vector);
        self.norms.push(norm);
        if let Some(sparse) = self.sparse.as_mut() {
            sparse.push(document.sparse_vector.unwrap_or_default());
        }

        self.positions.insert(document.id.clone(), position);
        self.ids.push(document.id);
        self.kinds.push(document.kind);
        self.texts.push(document.text);
        self.sources.push(document.source);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// O(1) id -> position lookup
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> &str {
        &self.ids[position]
    }

    pub fn kind(&self, position: usize) -> DocumentKind {
        self.kinds[position]
    }

    pub fn text(&self, position: usize) -> &str {
        &self.texts[position]
    }

    pub fn source(&self, position: usize) -> &SourceMeta {
        &self.sources[position]
    }

    /// Dense vector of the document at `position`
    pub fn dense(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.dense[start..start + self.dimension]
    }

    /// Euclidean norm of the dense vector at `position`
    pub fn norm(&self, position: usize) -> f32 {
        self.norms[position]
    }

    /// Sparse maps, one per document, when hybrid scoring is enabled
    pub fn sparse(&self) -> Option<&[SparseVector]> {
        self.sparse.as_deref()
    }

    pub fn sparse_count(&self) -> usize {
        self.sparse
            .as_ref()
            .map_or(0, |sparse| sparse.iter().filter(|s| !s.is_empty()).count())
    }

    pub fn comment_index(&self) -> &CommentIndex {
        &self.comments_by_post
    }

    pub fn comments_for(&self, post_id: &str) -> &[CommentRef] {
        self.comments_by_post
            .get(post_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Materialize the document at `position` as a retrieval result
    pub fn scored(&self, position: usize, score: f32, dense_score: Option<f32>) -> ScoredDocument {
        ScoredDocument {
            id: self.ids[position].clone(),
            kind: self.kinds[position],
            score,
            dense_score,
            text: self.texts[position].clone(),
            source: self.sources[position].clone(),
        }
    }
}

/// Loads the embedded corpus from a [`DocumentStore`]
pub struct CorpusCache {
    store: Arc<dyn DocumentStore>,
    use_hybrid: bool,
    expected_dim: Option<usize>,
}

impl CorpusCache {
    pub fn new(store: Arc<dyn DocumentStore>, use_hybrid: bool, expected_dim: Option<usize>) -> Self {
        Self {
            store,
            use_hybrid,
            expected_dim,
        }
    }

    /// Pull every embedded document into memory.
    ///
    /// # Errors
    /// - Store errors
    /// - `EmptyCorpus` / `DimensionMismatch`, both fatal at startup
    pub async fn load(&self) -> Result<CorpusSnapshot> {
        let documents = self.store.load_embedded().await?;
        let snapshot = CorpusSnapshot::from_documents(documents, self.use_hybrid, self.expected_dim)?;

        info!(
            "Loaded {} embedded documents from {} store (dimension {})",
            snapshot.len(),
            self.store.name(),
            snapshot.dimension()
        );
        if self.use_hybrid {
            info!(
                "Sparse embeddings: {}/{}",
                snapshot.sparse_count(),
                snapshot.len()
            );
        }
        let comment_total: usize = snapshot.comment_index().values().map(Vec::len).sum();
        info!(
            "Indexed {} comments for {} posts",
            comment_total,
            snapshot.comment_index().len()
        );

        Ok(snapshot)
    }
}
