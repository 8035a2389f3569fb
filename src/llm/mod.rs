//! Text generation module
//!
//! The generation model is an external capability: a prompt goes in, an
//! answer string comes out. [`LlmClient`] speaks to Gemini, OpenAI-compatible
//! and Ollama endpoints; [`LlmService`] adds a deadline and turns failures
//! into an in-band answer so callers always get text back.

pub mod client;
pub mod service;

use async_trait::async_trait;

pub use client::LlmClient;
pub use service::LlmService;

use crate::errors::Result;

/// External text-generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
