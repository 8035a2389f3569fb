//! Plain document store on Postgres with a pgvector column.
//!
//! Lexical weights are not stored here: every document loads with an empty
//! sparse vector, which makes hybrid scoring degrade to dense-only.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;
use tracing::info;

use super::DocumentStore;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::ThreadRagError;
use crate::models::is_real_embedding;
use crate::models::Document;
use crate::models::DocumentKind;
use crate::models::SourceMeta;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    kind: String,
    text: String,
    post_id: String,
    comment_id: Option<String>,
    permalink_url: Option<String>,
    embedding: Option<Vector>,
    created_time: Option<String>,
    fetched_at: Option<String>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = ThreadRagError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let kind = match row.kind.as_str() {
            "post" => DocumentKind::Post,
            "comment" => DocumentKind::Comment,
            other => {
                return Err(ThreadRagError::Store(format!(
                    "Unknown document kind '{other}' for {}",
                    row.id
                )))
            }
        };

        Ok(Self {
            id: row.id,
            kind,
            text: row.text,
            source: SourceMeta {
                post_id: row.post_id,
                comment_id: row.comment_id,
                permalink_url: row.permalink_url,
            },
            dense_vector: row.embedding.map(|v| v.to_vec()).unwrap_or_default(),
            sparse_vector: None,
            created_time: row.created_time,
            fetched_at: row.fetched_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, kind, text, post_id, comment_id, permalink_url, embedding, created_time, fetched_at";

impl PostgresStore {
    /// Wrap an existing pool. `table` must be a plain SQL identifier.
    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Create a new store from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.store.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.store.connection_timeout,
            ))
            .connect(&config.store.url)
            .await?;
        Self::new(pool, &config.store.collection)
    }

    /// Get a reference to the pool for raw queries
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_documents(&self, sql: &str, limit: Option<i64>) -> Result<Vec<Document>> {
        let mut query = sqlx::query_as::<_, DocumentRow>(sql);
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Document::try_from)
            .collect()
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ThreadRagError::Config(format!(
            "Invalid table name '{name}': use letters, digits and underscores"
        )))
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn load_embedded(&self) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {} WHERE embedding IS NOT NULL AND vector_norm(embedding) > 0 ORDER BY id",
            self.table
        );
        let documents = self.fetch_documents(&sql, None).await?;
        debug!("Fetched {} embedded documents from {}", documents.len(), self.table);
        Ok(documents)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {} WHERE id = $1", self.table);
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Document::try_from).transpose()
    }

    async fn upsert(&self, documents: &[Document]) -> Result<usize> {
        let sql = format!(
            r"
            INSERT INTO {} (
                id, kind, text, post_id, comment_id, permalink_url,
                embedding, created_time, fetched_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                kind = EXCLUDED.kind,
                text = EXCLUDED.text,
                post_id = EXCLUDED.post_id,
                comment_id = EXCLUDED.comment_id,
                permalink_url = EXCLUDED.permalink_url,
                embedding = EXCLUDED.embedding,
                created_time = EXCLUDED.created_time,
                fetched_at = EXCLUDED.fetched_at,
                updated_at = NOW()
            ",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        for document in documents {
            let embedding = is_real_embedding(&document.dense_vector)
                .then(|| Vector::from(document.dense_vector.clone()));
            sqlx::query(&sql)
                .bind(&document.id)
                .bind(document.kind.as_str())
                .bind(&document.text)
                .bind(&document.source.post_id)
                .bind(&document.source.comment_id)
                .bind(&document.source.permalink_url)
                .bind(embedding)
                .bind(&document.created_time)
                .bind(&document.fetched_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(documents.len())
    }

    async fn pending_embedding(&self, limit: usize) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {} WHERE embedding IS NULL OR vector_norm(embedding) = 0 ORDER BY id LIMIT $1",
            self.table
        );
        self.fetch_documents(&sql, Some(i64::try_from(limit).unwrap_or(i64::MAX))).await
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL CHECK (kind IN ('post', 'comment')),
                text TEXT NOT NULL,
                post_id TEXT NOT NULL,
                comment_id TEXT,
                permalink_url TEXT,
                embedding vector,
                created_time TEXT,
                fetched_at TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
            self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_post_id ON {0} (post_id)",
            self.table
        ))
        .execute(&self.pool)
        .await?;

        info!("Schema ready for table {}", self.table);
        Ok(())
    }
}
