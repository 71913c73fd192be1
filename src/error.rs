//! Custom error types for mnemos

use thiserror::Error;

/// Main error type for mnemos operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request (missing workspace path, blank query, bad parameters)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Nothing to ingest: extracted content is empty")]
    EmptyContent,

    #[error("An index job ({job_id}) is already active for workspace {workspace}")]
    JobConflict { workspace: String, job_id: String },

    /// Embedding provider or network call failed
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Workspace scan error: {0}")]
    Ignore(#[from] ignore::Error),

    #[error("Not initialized: run 'mnemos init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Batch-level failures that ingestion and indexing log and skip
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Http(_))
    }
}

/// Result type alias for mnemos
pub type Result<T> = std::result::Result<T, Error>;
