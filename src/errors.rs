use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThreadRagError {
    #[error("No embedded documents found in the store; run `threadrag embed` first")]
    EmptyCorpus,

    #[error("Dimension mismatch for {id}: expected {expected}, found {found}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Embedding provider failed: {0}")]
    EncodingFailure(String),

    #[error("Generation model failed: {0}")]
    GenerationFailure(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("Document store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThreadRagError {
    /// Errors that must stop the process before it serves any request.
    pub const fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Self::EmptyCorpus | Self::DimensionMismatch { .. } | Self::Config(_) | Self::ConfigLoad(_)
        )
    }
}

impl From<reqwest::Error> for ThreadRagError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ThreadRagError>;
