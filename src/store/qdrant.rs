//! Vector index store backed by the Qdrant REST API.
//!
//! Points carry the document fields in their payload (`doc_id`, `type`,
//! `text`, `source`, timestamps) and the lexical weights under
//! `sparse_embedding` as a `{"<term id>": weight}` object.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::DocumentStore;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::is_real_embedding;
use crate::models::Document;
use crate::models::DocumentKind;
use crate::models::SourceMeta;
use crate::models::SparseVector;

/// Points fetched per scroll request
const SCROLL_PAGE_SIZE: usize = 256;

pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    dimension: usize,
    /// doc_id -> point id, learned while scrolling so updates hit the same point
    point_ids: RwLock<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<QdrantPoint>,
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QdrantPoint {
    id: Value,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    vector: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointPayload {
    doc_id: String,
    #[serde(rename = "type")]
    kind: DocumentKind,
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: SourceMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sparse_embedding: Option<HashMap<String, f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fetched_at: Option<String>,
}

impl QdrantStore {
    pub fn new(
        base_url: &str,
        collection: &str,
        api_key: Option<String>,
        dimension: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
            dimension,
            point_ids: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.store.url,
            &config.store.collection,
            config.store.api_key.clone(),
            config.embeddings.dimension,
            config.store.connection_timeout,
        )
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ThreadRagError::Store(format!(
                "Qdrant error ({status}): {error_text}"
            )));
        }
        let body: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| ThreadRagError::Store(format!("Failed to parse Qdrant response: {e}")))?;
        Ok(body.result)
    }

    /// Scroll through points matching `filter`, stopping after `limit` documents
    /// accepted by `keep`.
    async fn scroll<F>(&self, filter: Option<Value>, limit: usize, keep: F) -> Result<Vec<Document>>
    where
        F: Fn(&Document) -> bool + Send,
    {
        let url = self.collection_url("/points/scroll");
        let mut documents = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": true,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }

            let page: ScrollResult = self
                .send(self.request(reqwest::Method::POST, &url).json(&body))
                .await?;
            debug!("Scrolled {} points from {}", page.points.len(), self.collection);

            let mut point_ids = self.point_ids.write().await;
            for point in page.points {
                let id = point.id.clone();
                let Some(document) = point_to_document(point) else {
                    continue;
                };
                point_ids.insert(document.id.clone(), id);
                if keep(&document) {
                    documents.push(document);
                    if documents.len() >= limit {
                        return Ok(documents);
                    }
                }
            }
            drop(point_ids);

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn point_id_for(&self, doc_id: &str) -> Value {
        if let Some(id) = self.point_ids.read().await.get(doc_id) {
            return id.clone();
        }
        Value::from(stable_point_id(doc_id))
    }
}

/// Stable unsigned point id for documents Qdrant has not seen yet (FNV-1a).
fn stable_point_id(doc_id: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    doc_id
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
        >> 1
}

/// Extract the dense vector from either an unnamed or a named-vector point
fn dense_from_value(value: Value) -> Vec<f32> {
    match value {
        Value::Array(_) => serde_json::from_value(value).unwrap_or_default(),
        Value::Object(named) => named
            .into_iter()
            .find_map(|(_, v)| serde_json::from_value::<Vec<f32>>(v).ok())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn point_to_document(point: QdrantPoint) -> Option<Document> {
    let Some(payload) = point.payload else {
        warn!("Skipping Qdrant point {} without payload", point.id);
        return None;
    };
    let payload: PointPayload = match serde_json::from_value(payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Skipping Qdrant point {} with malformed payload: {e}", point.id);
            return None;
        }
    };

    let sparse_vector = payload.sparse_embedding.map(|weights| {
        weights
            .into_iter()
            .filter_map(|(term, weight)| term.parse::<u32>().ok().map(|t| (t, weight)))
            .collect::<SparseVector>()
    });

    Some(Document {
        id: payload.doc_id,
        kind: payload.kind,
        text: payload.text,
        source: payload.source,
        dense_vector: point.vector.map(dense_from_value).unwrap_or_default(),
        sparse_vector,
        created_time: payload.created_time,
        fetched_at: payload.fetched_at,
    })
}

#[async_trait]
impl DocumentStore for QdrantStore {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn load_embedded(&self) -> Result<Vec<Document>> {
        self.scroll(None, usize::MAX, Document::has_embedding).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        let filter = json!({
            "must": [{ "key": "doc_id", "match": { "value": id } }]
        });
        let mut found = self.scroll(Some(filter), 1, |_| true).await?;
        Ok(found.pop())
    }

    async fn upsert(&self, documents: &[Document]) -> Result<usize> {
        let mut points = Vec::with_capacity(documents.len());
        for document in documents {
            let vector = if is_real_embedding(&document.dense_vector) {
                document.dense_vector.clone()
            } else {
                vec![0.0; self.dimension]
            };
            let payload = PointPayload {
                doc_id: document.id.clone(),
                kind: document.kind,
                text: document.text.clone(),
                source: document.source.clone(),
                sparse_embedding: document.sparse_vector.as_ref().map(|sparse| {
                    sparse
                        .iter()
                        .map(|(term, weight)| (term.to_string(), *weight))
                        .collect()
                }),
                created_time: document.created_time.clone(),
                fetched_at: document.fetched_at.clone(),
            };
            let point_id = self.point_id_for(&document.id).await;
            points.push(json!({
                "id": point_id,
                "vector": vector,
                "payload": payload,
            }));
        }

        let url = self.collection_url("/points?wait=true");
        let _: Value = self
            .send(
                self.request(reqwest::Method::PUT, &url)
                    .json(&json!({ "points": points })),
            )
            .await?;
        Ok(documents.len())
    }

    async fn pending_embedding(&self, limit: usize) -> Result<Vec<Document>> {
        self.scroll(None, limit, |doc| !doc.has_embedding()).await
    }

    async fn ensure_schema(&self) -> Result<()> {
        let url = self.collection_url("");
        let exists = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await?
            .status()
            .is_success();
        if exists {
            debug!("Qdrant collection {} already exists", self.collection);
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": self.dimension, "distance": "Cosine" }
        });
        let _: Value = self
            .send(self.request(reqwest::Method::PUT, &url).json(&body))
            .await?;
        info!(
            "Created Qdrant collection {} (dimension {})",
            self.collection, self.dimension
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_with_sparse_payload() {
        let point: QdrantPoint = serde_json::from_value(json!({
            "id": 7,
            "vector": [0.1, 0.2, 0.3],
            "payload": {
                "doc_id": "post::p1",
                "type": "post",
                "text": "lecture on databases",
                "source": { "post_id": "p1", "permalink_url": "https://fb.com/p1" },
                "sparse_embedding": { "12": 0.4, "99": 0.1, "bogus": 1.0 },
                "embedding_model": "BAAI/bge-m3"
            }
        }))
        .unwrap();

        let doc = point_to_document(point).unwrap();
        assert_eq!(doc.id, "post::p1");
        assert_eq!(doc.kind, DocumentKind::Post);
        assert_eq!(doc.dense_vector.len(), 3);
        let sparse = doc.sparse_vector.unwrap();
        assert_eq!(sparse.len(), 2);
        assert!((sparse[&12] - 0.4).abs() < f32::EPSILON);
        assert_eq!(doc.source.link(), Some("https://fb.com/p1"));
    }

    #[test]
    fn test_named_vector_point() {
        let point: QdrantPoint = serde_json::from_value(json!({
            "id": "5c56c793-69f3-4fbf-87e6-c4bf54c28c26",
            "vector": { "dense": [1.0, 0.0] },
            "payload": {
                "doc_id": "comment::c1",
                "type": "comment",
                "text": "great class",
                "source": { "post_id": "p1", "comment_id": "c1" }
            }
        }))
        .unwrap();

        let doc = point_to_document(point).unwrap();
        assert_eq!(doc.dense_vector, vec![1.0, 0.0]);
        assert!(doc.sparse_vector.is_none());
    }

    #[test]
    fn test_point_without_payload_is_skipped() {
        let point: QdrantPoint =
            serde_json::from_value(json!({ "id": 1, "vector": [0.5] })).unwrap();
        assert!(point_to_document(point).is_none());
    }

    #[test]
    fn test_point_with_malformed_payload_is_skipped() {
        let point: QdrantPoint = serde_json::from_value(json!({
            "id": 2,
            "vector": [0.5],
            "payload": { "text": "no doc id" }
        }))
        .unwrap();
        assert!(point_to_document(point).is_none());
    }

    #[test]
    fn test_stable_point_id() {
        assert_eq!(stable_point_id("post::1"), stable_point_id("post::1"));
        assert_ne!(stable_point_id("post::1"), stable_point_id("post::2"));
        assert!(stable_point_id("comment::x") < (1 << 63));
    }
}
