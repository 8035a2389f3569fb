//! HTTP clients for the supported generation providers

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;

use super::Generator;
use crate::config::LlmConfig;
use crate::config::LlmProviderKind;
use crate::errors::Result;
use crate::errors::ThreadRagError;

/// Client for generating text from various providers
pub struct LlmClient {
    provider: LlmProviderKind,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: usize,
    client: Client,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            provider: config.provider,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    pub const fn provider(&self) -> LlmProviderKind {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        bearer: bool,
    ) -> Result<Value> {
        let mut request = self.client.post(url).json(body);
        match (&self.api_key, self.provider) {
            (Some(key), LlmProviderKind::Gemini) => {
                request = request.header("x-goog-api-key", key);
            }
            (Some(key), _) if bearer => {
                request = request.header("Authorization", format!("Bearer {key}"));
            }
            _ => {}
        }

        let response = request
            .send()
            .await
            .map_err(|e| ThreadRagError::GenerationFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ThreadRagError::GenerationFailure(format!(
                "{} API error ({status}): {error_text}",
                self.provider
            )));
        }

        response.json().await.map_err(|e| {
            ThreadRagError::GenerationFailure(format!("Failed to parse response: {e}"))
        })
    }

    async fn generate_gemini(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_none() {
            return Err(ThreadRagError::Config("Gemini API key not provided".to_string()));
        }

        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });
        debug!("Calling Gemini generateContent ({})", self.model);

        let response = self.post_json(&url, &body, false).await?;
        Ok(gemini_text(&response))
    }

    async fn generate_openai(&self, prompt: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }

        #[derive(Deserialize)]
        struct Message {
            #[serde(default)]
            content: Option<String>,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        debug!("Calling chat completions API ({})", self.model);

        let response: ChatResponse = serde_json::from_value(self.post_json(&url, &body, true).await?)?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    async fn generate_ollama(&self, prompt: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct OllamaResponse {
            #[serde(default)]
            response: String,
        }

        let url = format!("{}/api/generate", self.endpoint);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        debug!("Calling Ollama generate API ({})", self.model);

        let response: OllamaResponse =
            serde_json::from_value(self.post_json(&url, &body, false).await?)?;
        Ok(response.response)
    }
}

/// Concatenate the text parts of the first Gemini candidate
fn gemini_text(response: &Value) -> String {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.provider {
            LlmProviderKind::Gemini => self.generate_gemini(prompt).await,
            LlmProviderKind::OpenAI => self.generate_openai(prompt).await,
            LlmProviderKind::Ollama => self.generate_ollama(prompt).await,
        }
    }
}
