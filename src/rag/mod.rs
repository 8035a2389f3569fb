//! Hybrid retrieval and answering over posts and their comment threads
//!
//! This module provides the core of the question-answering flow:
//! - [`CorpusCache`] loads every embedded document into an immutable
//!   [`CorpusSnapshot`] once per process
//! - [`HybridScorer`] fuses cosine similarity with a lexical dot product
//! - [`Retriever`] encodes the query, scores, ranks and selects the top-k
//! - [`ContextAssembler`] turns a post and its comments into model context
//! - [`AnsweringPolicy`] gates on the top score and produces the final answer
//!
//! # Examples
//!
//! ```rust,no_run
//! use threadrag::app::AppContext;
//! use threadrag::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let context = AppContext::build(config).await?;
//!
//!     let response = context.policy.answer("When is the database exam?").await?;
//!     println!("Answer: {}", response.answer);
//!     println!("Sources: {}", response.sources.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod scorer;

pub use cache::CommentIndex;
pub use cache::CorpusCache;
pub use cache::CorpusSnapshot;
pub use context::ContextAssembler;
pub use pipeline::AnsweringPolicy;
pub use pipeline::ChatResponse;
pub use pipeline::NO_DATA_ANSWER;
pub use retriever::Retriever;
pub use scorer::HybridScorer;
pub use scorer::QueryScores;
