//! Context assembly from retrieved documents

use std::fmt::Write;

use crate::models::is_placeholder_text;
use crate::models::ScoredDocument;
use crate::rag::cache::CommentIndex;

pub const POST_HEADER: &str = "=== POST ===";
pub const COMMENTS_HEADER: &str = "=== COMMENTS ===";

/// Assembler for creating context from retrieved documents
pub struct ContextAssembler {
    max_context_length: usize,
}

impl ContextAssembler {
    /// Create a new context assembler; `max_context_length` is in characters
    #[must_use]
    pub const fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    /// One labeled block per document, in the given order.
    ///
    /// Blocks that would push the context past the length limit are dropped.
    #[must_use]
    pub fn build_list_context(&self, documents: &[ScoredDocument]) -> String {
        let mut blocks: Vec<String> = Vec::with_capacity(documents.len());
        let mut total_length = 0;

        for (idx, document) in documents.iter().enumerate() {
            let link = document.source.link().unwrap_or_default();
            let header = match document.dense_score {
                Some(dense) => format!(
                    "[DOC {}] final_score={:.3} (dense={:.3})",
                    idx + 1,
                    document.score,
                    dense
                ),
                None => format!("[DOC {}] score={:.3}", idx + 1, document.score),
            };
            let block = format!("{header}\ntext: {}\nsource: {link}\n", document.text);

            let block_length = block.chars().count();
            if total_length + block_length > self.max_context_length {
                break;
            }
            total_length += block_length;
            blocks.push(block);
        }

        blocks.join("\n\n")
    }

    /// The post followed by its comments.
    ///
    /// Placeholder and blank comments are skipped; the COMMENTS block is left
    /// out entirely when nothing qualifies.
    #[must_use]
    pub fn build_post_context(&self, post: &ScoredDocument, comments: &CommentIndex) -> String {
        let mut context = format!(
            "{POST_HEADER}\ntext: {}\nsource: {}",
            post.text,
            post.source.link().unwrap_or_default()
        );
        let mut total_length = context.chars().count();

        let qualifying = comments
            .get(&post.source.post_id)
            .into_iter()
            .flatten()
            .map(|comment| comment.text.trim())
            .filter(|text| !is_placeholder_text(text));

        let mut lines = Vec::new();
        for (idx, text) in qualifying.enumerate() {
            let line = format!("Comment {}: {text}", idx + 1);
            let line_length = line.chars().count() + 1;
            if total_length + line_length > self.max_context_length {
                break;
            }
            total_length += line_length;
            lines.push(line);
        }

        if !lines.is_empty() {
            let _ = write!(context, "\n\n{COMMENTS_HEADER}\n{}", lines.join("\n"));
        }
        context
    }

    /// Text-only context for a single document, with no comments
    #[must_use]
    pub fn build_text_context(&self, document: &ScoredDocument) -> String {
        format!(
            "text: {}\nsource: {}",
            document.text,
            document.source.link().unwrap_or_default()
        )
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(12_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommentRef;
    use crate::models::DocumentKind;
    use crate::models::SourceMeta;
    use crate::models::NO_MESSAGE;

    fn post(post_id: &str, text: &str, link: Option<&str>) -> ScoredDocument {
        ScoredDocument {
            id: format!("post::{post_id}"),
            kind: DocumentKind::Post,
            score: 0.8,
            dense_score: Some(0.6),
            text: text.to_string(),
            source: SourceMeta {
                post_id: post_id.to_string(),
                comment_id: None,
                permalink_url: link.map(str::to_string),
            },
        }
    }

    fn comments(post_id: &str, texts: &[&str]) -> CommentIndex {
        let refs = texts
            .iter()
            .enumerate()
            .map(|(i, text)| CommentRef {
                text: (*text).to_string(),
                comment_id: Some(format!("c{i}")),
            })
            .collect();
        CommentIndex::from([(post_id.to_string(), refs)])
    }

    #[test]
    fn test_post_context_includes_real_comments_only() {
        let assembler = ContextAssembler::default();
        let context = assembler.build_post_context(
            &post("P1", "lecture on databases", Some("https://fb.com/P1")),
            &comments("P1", &["great class", NO_MESSAGE, "   "]),
        );

        assert_eq!(
            context,
            "=== POST ===\ntext: lecture on databases\nsource: https://fb.com/P1\n\n\
             === COMMENTS ===\nComment 1: great class"
        );
    }

    #[test]
    fn test_post_context_omits_empty_comments_block() {
        let assembler = ContextAssembler::default();
        let placeholder_only = assembler.build_post_context(
            &post("P1", "lecture", None),
            &comments("P1", &[NO_MESSAGE]),
        );
        assert!(!placeholder_only.contains(COMMENTS_HEADER));

        let none = assembler.build_post_context(&post("P2", "exam", None), &comments("P1", &["hi"]));
        assert_eq!(none, "=== POST ===\ntext: exam\nsource: ");
    }

    #[test]
    fn test_list_context_format() {
        let assembler = ContextAssembler::default();
        let mut second = post("P2", "exam schedule", None);
        second.dense_score = None;
        second.score = 1.0;

        let context =
            assembler.build_list_context(&[post("P1", "lecture", Some("https://fb.com/P1")), second]);
        assert_eq!(
            context,
            "[DOC 1] final_score=0.800 (dense=0.600)\ntext: lecture\nsource: https://fb.com/P1\n\n\n\
             [DOC 2] score=1.000\ntext: exam schedule\nsource: \n"
        );
    }

    #[test]
    fn test_list_context_respects_length_limit() {
        let assembler = ContextAssembler::new(80);
        let docs = vec![post("P1", "short", None), post("P2", &"long ".repeat(40), None)];
        let context = assembler.build_list_context(&docs);
        assert!(context.contains("[DOC 1]"));
        assert!(!context.contains("[DOC 2]"));
    }

    #[test]
    fn test_text_context() {
        let assembler = ContextAssembler::default();
        let context = assembler.build_text_context(&post("P1", "only text", Some("https://x")));
        assert_eq!(context, "text: only text\nsource: https://x");
    }
}
