//! Error types shared across the apipull workspace

use thiserror::Error;

/// Result type alias for apipull operations
pub type Result<T> = std::result::Result<T, ApipullError>;

/// Main error type for apipull
#[derive(Error, Debug)]
pub enum ApipullError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
