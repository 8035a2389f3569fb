//! Generation service with a deadline and in-band degradation

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use super::client::LlmClient;
use super::Generator;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;

/// Prefix of the answer returned when the generation model cannot be reached
pub const GENERATION_ERROR_PREFIX: &str = "Error calling the generation model";

/// LLM service for text generation
pub struct LlmService {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl LlmService {
    /// Create a new LLM service from the `[llm]` configuration
    ///
    /// # Errors
    /// - HTTP client construction errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = LlmClient::new(&config.llm)?;
        debug!("Using {} generation model {}", client.provider(), client.model());
        Ok(Self::from_generator(
            Arc::new(client),
            Duration::from_secs(config.llm.timeout_secs),
        ))
    }

    pub fn from_generator(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Generate text, failing with `Timeout` if the model does not answer in time
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.generator.generate(prompt))
            .await
            .map_err(|_| ThreadRagError::Timeout {
                operation: "generation request",
                seconds: self.timeout.as_secs(),
            })?
    }

    /// Generate text; any failure becomes the answer text itself
    pub async fn generate_or_degrade(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Generation failed: {}", e);
                format!("{GENERATION_ERROR_PREFIX}: {e}")
            }
        }
    }
}
