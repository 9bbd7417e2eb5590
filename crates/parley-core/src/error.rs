//! Error types for Parley

use thiserror::Error;

/// Result type alias using Parley's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Parley error types
///
/// Store-layer failures surface as values to the caller; nothing in the core
/// retries on its own. Retry policy, if any, belongs to the transport.
#[derive(Error, Debug)]
pub enum Error {
    // Record errors (E001-E099)
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Malformed stored record: {0}")]
    Decode(String),

    // Write errors (E100-E199)
    #[error("Write rejected by backing store: {0}")]
    WriteFailure(String),

    #[error("Message id collision: {0}")]
    IdCollision(String),

    // Backend errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Hardening (E700-E799)
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E001",
            Self::AlreadyExists(_) => "E002",
            Self::Decode(_) => "E003",
            Self::WriteFailure(_) => "E100",
            Self::IdCollision(_) => "E101",
            Self::Database(_) => "E400",
            Self::Network(_) => "E401",
            Self::Serialization(_) => "E402",
            Self::Config(_) => "E600",
            Self::Timeout(_) => "E700",
            Self::Io(_) => "E9999",
        }
    }
}
