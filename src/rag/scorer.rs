//! Dense + sparse score fusion over the cached corpus

use crate::config::RetrievalConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::SparseVector;
use crate::rag::cache::CorpusSnapshot;

/// Added to vector norms so zero vectors never divide by zero
pub const NORM_EPSILON: f32 = 1e-8;

/// Per-document scores for one query, indexed by corpus position
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScores {
    /// Raw cosine similarity in [-1, 1]
    pub dense: Vec<f32>,
    /// Fused ranking score
    pub fused: Vec<f32>,
}

/// Hybrid scorer: `dense_weight * (cos + 1) / 2 + sparse_weight * minmax(dot)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridScorer {
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub use_hybrid: bool,
    pub min_score: Option<f32>,
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self::new(&RetrievalConfig::default())
    }
}

impl HybridScorer {
    #[must_use]
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            dense_weight: config.dense_weight,
            sparse_weight: config.sparse_weight,
            use_hybrid: config.use_hybrid,
            min_score: config.min_score,
        }
    }

    /// Score every cached document against one query.
    ///
    /// Sparse scores only take part when hybrid mode is on, the query came
    /// with lexical weights and the corpus was loaded with sparse maps.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the query vector length differs from the corpus
    pub fn score(
        &self,
        query_dense: &[f32],
        query_sparse: Option<&SparseVector>,
        corpus: &CorpusSnapshot,
    ) -> Result<QueryScores> {
        if query_dense.len() != corpus.dimension() {
            return Err(ThreadRagError::DimensionMismatch {
                id: "query".to_string(),
                expected: corpus.dimension(),
                found: query_dense.len(),
            });
        }

        let dense = cosine_similarities(query_dense, corpus);
        let dense_normalized = dense.iter().map(|s| normalize_dense(*s));

        let sparse = match (self.use_hybrid, query_sparse, corpus.sparse()) {
            (true, Some(query), Some(documents)) => {
                let mut scores: Vec<f32> = documents.iter().map(|doc| sparse_dot(query, doc)).collect();
                min_max_normalize(&mut scores);
                Some(scores)
            }
            _ => None,
        };

        let fused = match sparse {
            Some(sparse) => dense_normalized
                .zip(sparse)
                .map(|(d, s)| self.dense_weight * d + self.sparse_weight * s)
                .collect(),
            None => dense_normalized.collect(),
        };

        Ok(QueryScores { dense, fused })
    }

    /// Positions of the `top_k` best documents, best first.
    ///
    /// Ties keep corpus order. With a `min_score` floor only documents at or
    /// above it are eligible, unless none are, in which case the unfiltered
    /// ranking is used instead.
    #[must_use]
    pub fn rank(&self, fused: &[f32], top_k: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..fused.len()).collect();
        order.sort_by(|&a, &b| fused[b].total_cmp(&fused[a]));

        if let Some(floor) = self.min_score {
            let eligible: Vec<usize> = order.iter().copied().filter(|&i| fused[i] >= floor).collect();
            if !eligible.is_empty() {
                order = eligible;
            }
        }

        order.truncate(top_k);
        order
    }
}

/// Cosine similarity of the query against every cached vector
pub fn cosine_similarities(query: &[f32], corpus: &CorpusSnapshot) -> Vec<f32> {
    let query_norm = query.iter().map(|v| v * v).sum::<f32>().sqrt() + NORM_EPSILON;
    (0..corpus.len())
        .map(|position| {
            let dot: f32 = query
                .iter()
                .zip(corpus.dense(position))
                .map(|(q, d)| q * d)
                .sum();
            dot / (query_norm * (corpus.norm(position) + NORM_EPSILON))
        })
        .collect()
}

/// Rescale a cosine similarity from [-1, 1] to [0, 1]
#[inline]
pub fn normalize_dense(similarity: f32) -> f32 {
    (similarity + 1.0) / 2.0
}

/// Sum of `q[t] * d[t]` over shared term ids; zero when either side is empty
pub fn sparse_dot(query: &SparseVector, document: &SparseVector) -> f32 {
    let (small, large) = if query.len() <= document.len() {
        (query, document)
    } else {
        (document, query)
    };
    small
        .iter()
        .filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
        .sum()
}

/// Min-max normalize in place; a constant input becomes all 0.5
pub fn min_max_normalize(scores: &mut [f32]) {
    let (min, max) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(*s), hi.max(*s)));
    if max > min {
        let range = max - min;
        for score in scores.iter_mut() {
            *score = (*score - min) / range;
        }
    } else {
        scores.fill(0.5);
    }
}
