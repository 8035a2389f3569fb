//! Embedding API clients for various providers

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::EncodedBatch;
use super::Encoder;
use crate::config::EmbeddingProviderKind;
use crate::config::EmbeddingsConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::SparseVector;

/// Client for generating embeddings from various providers
pub struct EmbeddingClient {
    provider: EmbeddingProviderKind,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    return_sparse: bool,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client.
    ///
    /// Request deadlines are enforced by [`super::EmbeddingService`]; the HTTP
    /// client only bounds connection setup.
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            provider: config.provider,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            return_sparse: config.return_sparse,
            client,
        })
    }

    async fn post_json<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
        provider_name: &str,
    ) -> Result<R> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ThreadRagError::EncodingFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ThreadRagError::EncodingFailure(format!(
                "{provider_name} API error ({status}): {error_text}"
            )));
        }

        response.json().await.map_err(|e| {
            ThreadRagError::EncodingFailure(format!("Failed to parse response: {e}"))
        })
    }

    /// Generate embeddings in batch using `OpenAI` API
    async fn encode_openai(&self, texts: &[String]) -> Result<EncodedBatch> {
        if self.api_key.is_none() {
            return Err(ThreadRagError::Config("OpenAI API key not provided".to_string()));
        }

        #[derive(Serialize)]
        struct OpenAIBatchRequest<'a> {
            input: &'a [String],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI batch embeddings API: {} items", texts.len());

        let request = OpenAIBatchRequest {
            input: texts,
            model: &self.model,
        };
        let mut result: OpenAIResponse = self.post_json(&url, &request, "OpenAI").await?;
        result.data.sort_by_key(|d| d.index);

        Ok(EncodedBatch {
            dense: result.data.into_iter().map(|d| d.embedding).collect(),
            sparse: None,
        })
    }

    /// Ollama has no batch endpoint, so texts are encoded one by one
    async fn encode_ollama(&self, texts: &[String]) -> Result<EncodedBatch> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {} items", texts.len());

        let mut dense = Vec::with_capacity(texts.len());
        for text in texts {
            let request = OllamaRequest {
                model: &self.model,
                prompt: text,
            };
            let result: OllamaResponse = self.post_json(&url, &request, "Ollama").await?;
            dense.push(result.embedding);
        }

        Ok(EncodedBatch {
            dense,
            sparse: None,
        })
    }

    /// BGE-M3 encoding service returning dense vectors and lexical weights
    async fn encode_bge_m3(&self, texts: &[String]) -> Result<EncodedBatch> {
        #[derive(Serialize)]
        struct BgeM3Request<'a> {
            texts: &'a [String],
            return_dense: bool,
            return_sparse: bool,
        }

        #[derive(Deserialize)]
        struct BgeM3Response {
            dense_vecs: Vec<Vec<f32>>,
            #[serde(default)]
            lexical_weights: Option<Vec<HashMap<String, f32>>>,
        }

        let url = format!("{}/encode", self.endpoint);
        debug!("Calling BGE-M3 encode API: {} items", texts.len());

        let request = BgeM3Request {
            texts,
            return_dense: true,
            return_sparse: self.return_sparse,
        };
        let result: BgeM3Response = self.post_json(&url, &request, "BGE-M3").await?;

        let sparse = if self.return_sparse {
            result
                .lexical_weights
                .map(|weights| weights.into_iter().map(parse_lexical_weights).collect())
        } else {
            None
        };

        Ok(EncodedBatch {
            dense: result.dense_vecs,
            sparse,
        })
    }
}

/// Lexical weights arrive keyed by stringified term ids; unparsable keys are dropped
pub fn parse_lexical_weights(weights: HashMap<String, f32>) -> SparseVector {
    weights
        .into_iter()
        .filter_map(|(term, weight)| term.trim().parse::<u32>().ok().map(|t| (t, weight)))
        .collect()
}

#[async_trait]
impl Encoder for EmbeddingClient {
    async fn encode(&self, texts: &[String]) -> Result<EncodedBatch> {
        match self.provider {
            EmbeddingProviderKind::OpenAI => self.encode_openai(texts).await,
            EmbeddingProviderKind::Ollama => self.encode_ollama(texts).await,
            EmbeddingProviderKind::BgeM3 => self.encode_bge_m3(texts).await,
        }
    }

    fn supports_sparse(&self) -> bool {
        self.provider == EmbeddingProviderKind::BgeM3 && self.return_sparse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_parse_lexical_weights() {
        let mut raw = HashMap::new();
        raw.insert("42".to_string(), 0.3);
        raw.insert(" 7 ".to_string(), 0.1);
        raw.insert("[CLS]".to_string(), 0.9);

        let sparse = parse_lexical_weights(raw);
        assert_eq!(sparse.len(), 2);
        assert!((sparse[&42] - 0.3).abs() < f32::EPSILON);
        assert!(sparse.contains_key(&7));
    }

    #[test]
    fn test_only_bge_m3_supports_sparse() {
        let mut config = AppConfig::default().embeddings;
        config.provider = EmbeddingProviderKind::BgeM3;
        assert!(EmbeddingClient::new(&config).unwrap().supports_sparse());

        config.return_sparse = false;
        assert!(!EmbeddingClient::new(&config).unwrap().supports_sparse());

        config.provider = EmbeddingProviderKind::Ollama;
        config.return_sparse = true;
        assert!(!EmbeddingClient::new(&config).unwrap().supports_sparse());
    }

    #[tokio::test]
    #[ignore = "Requires a running BGE-M3 encoding service"]
    async fn test_bge_m3_encoding() {
        let config = AppConfig::default().embeddings;
        let client = EmbeddingClient::new(&config).unwrap();

        let batch = client.encode(&["Hello, world!".to_string()]).await.unwrap();
        assert_eq!(batch.dense[0].len(), 1024);
        assert!(batch.sparse.is_some());
    }
}
