use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Placeholder stored in place of a missing or blank message body.
pub const NO_MESSAGE: &str = "[NO_MESSAGE]";

/// Term id -> non-negative lexical weight.
pub type SparseVector = HashMap<u32, f32>;

/// Kind of a retrievable document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Post,
    Comment,
}

impl DocumentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    /// Prefix used in document ids (`post::<id>`, `comment::<id>`)
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Post => "post::",
            Self::Comment => "comment::",
        }
    }

    /// Infer the kind from a document id
    pub fn from_document_id(id: &str) -> Option<Self> {
        if id.starts_with(Self::Post.id_prefix()) {
            Some(Self::Post)
        } else if id.starts_with(Self::Comment.id_prefix()) {
            Some(Self::Comment)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a document on the source platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink_url: Option<String>,
}

impl SourceMeta {
    /// Permalink, treating an empty string as absent
    pub fn link(&self) -> Option<&str> {
        self.permalink_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// The atomic retrievable unit: one post or one comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub kind: DocumentKind,
    pub text: String,
    pub source: SourceMeta,
    #[serde(default)]
    pub dense_vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_vector: Option<SparseVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
}

impl Document {
    /// Build a post document without embeddings
    pub fn post(post_id: &str, message: Option<&str>, permalink_url: Option<String>) -> Self {
        Self {
            id: post_document_id(post_id),
            kind: DocumentKind::Post,
            text: normalize_text(message),
            source: SourceMeta {
                post_id: post_id.to_string(),
                comment_id: None,
                permalink_url,
            },
            dense_vector: Vec::new(),
            sparse_vector: None,
            created_time: None,
            fetched_at: None,
        }
    }

    /// Build a comment document without embeddings
    pub fn comment(
        comment_id: &str,
        post_id: &str,
        message: Option<&str>,
        permalink_url: Option<String>,
    ) -> Self {
        Self {
            id: format!("{}{comment_id}", DocumentKind::Comment.id_prefix()),
            kind: DocumentKind::Comment,
            text: normalize_text(message),
            source: SourceMeta {
                post_id: post_id.to_string(),
                comment_id: Some(comment_id.to_string()),
                permalink_url,
            },
            dense_vector: Vec::new(),
            sparse_vector: None,
            created_time: None,
            fetched_at: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, dense: Vec<f32>, sparse: Option<SparseVector>) -> Self {
        self.dense_vector = dense;
        self.sparse_vector = sparse;
        self
    }

    /// True when the dense vector is present and not the all-zero placeholder
    pub fn has_embedding(&self) -> bool {
        is_real_embedding(&self.dense_vector)
    }

    pub fn is_placeholder_text(&self) -> bool {
        is_placeholder_text(&self.text)
    }
}

/// Document id of the post with the given platform id
pub fn post_document_id(post_id: &str) -> String {
    format!("{}{post_id}", DocumentKind::Post.id_prefix())
}

/// Trim a message body, substituting the placeholder for blank input
pub fn normalize_text(message: Option<&str>) -> String {
    match message.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => NO_MESSAGE.to_string(),
    }
}

pub fn is_placeholder_text(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == NO_MESSAGE
}

/// Safely truncate a string to a maximum number of characters (not bytes)
///
/// # Arguments
/// * `s` - The string to truncate
/// * `max_chars` - Maximum number of characters to keep
///
/// # Returns
/// Truncated string with "..." suffix if truncated, otherwise the original string
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Zero vectors are written by the indexer before the backfill runs.
pub fn is_real_embedding(vector: &[f32]) -> bool {
    !vector.is_empty() && vector.iter().any(|v| *v != 0.0)
}

/// Comment attached to a post, as kept in the corpus comment index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    pub text: String,
    pub comment_id: Option<String>,
}

/// A document returned by retrieval together with its scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub kind: DocumentKind,
    /// Fused ranking score in [0, 1] for default weights
    pub score: f32,
    /// Raw cosine similarity in [-1, 1]
    pub dense_score: Option<f32>,
    pub text: String,
    pub source: SourceMeta,
}

impl ScoredDocument {
    pub fn is_post(&self) -> bool {
        self.kind == DocumentKind::Post
    }
}

/// A link shown to the user next to the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub link: String,
    pub text: String,
}

/// Post record as exported by the crawler (one JSON object per line)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
    #[serde(default)]
    pub created_time: Option<serde_json::Value>,
    #[serde(default)]
    pub fetched_at: Option<serde_json::Value>,
}

/// Comment record as exported by the crawler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
    #[serde(default)]
    pub created_time: Option<serde_json::Value>,
    #[serde(default)]
    pub fetched_at: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_is_char_aware() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 5), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello...");
        assert_eq!(truncate_str("Xin chào các bạn", 8), "Xin chào...");
    }

    #[test]
    fn test_normalize_text_substitutes_placeholder() {
        assert_eq!(normalize_text(None), NO_MESSAGE);
        assert_eq!(normalize_text(Some("   ")), NO_MESSAGE);
        assert_eq!(normalize_text(Some("  hello \n")), "hello");
    }

    #[test]
    fn test_document_ids() {
        let post = Document::post("P1", Some("lecture"), None);
        assert_eq!(post.id, "post::P1");
        assert_eq!(post.kind, DocumentKind::Post);
        assert_eq!(post.source.post_id, "P1");

        let comment = Document::comment("C1", "P1", None, None);
        assert_eq!(comment.id, "comment::C1");
        assert_eq!(comment.source.comment_id.as_deref(), Some("C1"));
        assert!(comment.is_placeholder_text());
    }

    #[test]
    fn test_kind_from_document_id() {
        assert_eq!(
            DocumentKind::from_document_id("post::1"),
            Some(DocumentKind::Post)
        );
        assert_eq!(
            DocumentKind::from_document_id("comment::1"),
            Some(DocumentKind::Comment)
        );
        assert_eq!(DocumentKind::from_document_id("user::1"), None);
    }

    #[test]
    fn test_zero_vector_is_not_an_embedding() {
        assert!(!is_real_embedding(&[]));
        assert!(!is_real_embedding(&[0.0, 0.0, 0.0]));
        assert!(is_real_embedding(&[0.0, 0.1, 0.0]));
    }

    #[test]
    fn test_empty_permalink_is_absent() {
        let meta = SourceMeta {
            post_id: "1".to_string(),
            comment_id: None,
            permalink_url: Some("  ".to_string()),
        };
        assert_eq!(meta.link(), None);
    }

    #[test]
    fn test_document_json_roundtrip_keeps_sparse_keys() {
        let mut sparse = SparseVector::new();
        sparse.insert(17, 0.25);
        let doc = Document::post("9", Some("text"), Some("https://fb.com/9".to_string()))
            .with_embedding(vec![0.1, 0.2], Some(sparse));
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }
}
