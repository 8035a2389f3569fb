//! In-memory store, optionally backed by a JSON Lines snapshot file

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::warn;

use super::DocumentStore;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::Document;

pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Store holding the given documents, never written to disk
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
            path: None,
        }
    }

    /// Open a snapshot file; a missing file yields an empty store that will
    /// be created on the first upsert.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let documents = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            parse_snapshot(&content, &path)?
        } else {
            warn!("Snapshot file {} does not exist yet", path.display());
            Vec::new()
        };
        debug!("Loaded {} documents from {}", documents.len(), path.display());

        Ok(Self {
            documents: RwLock::new(documents),
            path: Some(path),
        })
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn persist(&self, documents: &[Document]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut buffer = String::new();
        for document in documents {
            buffer.push_str(&serde_json::to_string(document)?);
            buffer.push('\n');
        }

        // Write then rename so a crash never leaves a half-written snapshot
        let tmp_path = path.with_extension("jsonl.tmp");
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

fn parse_snapshot(content: &str, path: &Path) -> Result<Vec<Document>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Document>(line).map_err(|e| {
                ThreadRagError::Store(format!("{}:{}: {e}", path.display(), idx + 1))
            })
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load_embedded(&self) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| doc.has_embedding())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|doc| doc.id == id).cloned())
    }

    async fn upsert(&self, incoming: &[Document]) -> Result<usize> {
        let mut documents = self.documents.write().await;
        for document in incoming {
            match documents.iter_mut().find(|doc| doc.id == document.id) {
                Some(existing) => *existing = document.clone(),
                None => documents.push(document.clone()),
            }
        }
        self.persist(&documents).await?;
        Ok(incoming.len())
    }

    async fn pending_embedding(&self, limit: usize) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| !doc.has_embedding())
            .take(limit)
            .cloned()
            .collect())
    }
}
