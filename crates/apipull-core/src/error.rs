//! Error types for the core fetch engine

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the fetch engine, loader, and resolver.
///
/// Ordinary fetch failures (bad status, vendor quirks, exhausted retries)
/// are NOT errors: they come back as a `FetchResult` with a failure history.
/// This enum covers programmer mistakes, configuration problems, and
/// cancellation.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("step_nr must be 1-based, got {0}")]
    InvalidStepNr(u32),

    #[error("invalid request URI: {0}")]
    InvalidUri(String),

    #[error(
        "endpoint '{0}' requires an iteration list (e.g. carrier results from a prior load); \
         pass the output of the dependency endpoint"
    )]
    MissingIterationList(String),

    #[error("circular dependency detected at '{0}'")]
    DependencyCycle(String),

    #[error("dependency '{depends_on}' not found for endpoint '{endpoint}'")]
    DependencyNotFound { endpoint: String, depends_on: String },

    #[error("endpoint '{0}' requires an iteration list but declares no dependency")]
    MissingDependencyDeclaration(String),

    #[error("endpoint '{0}' not found in catalog")]
    EndpointNotFound(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
