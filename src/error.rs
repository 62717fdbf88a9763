use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestLensError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed cursor: {0}")]
    MalformedCursor(String),

    #[error("Object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Storage API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Storage API failed after {retries} retries (last status {status})")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestLensError {
    /// Pagination argument problems the caller has to fix.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MalformedCursor(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, TestLensError>;
