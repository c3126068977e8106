//! apipull common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the apipull workspace:
//!
//! - **Error Handling**: the workspace-wide error enum and result alias
//! - **Checksums**: SHA-256 helpers used for payload digests and request identity
//! - **Logging**: centralized tracing setup shared by all binaries

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{ApipullError, Result};
