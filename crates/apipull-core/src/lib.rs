//! apipull core engine
//!
//! Vendor-agnostic fetch orchestration for paginated vendor APIs:
//!
//! - **model**: request/result/run/endpoint domain types
//! - **adapter**: the per-vendor strategy contract plus identity hashing
//!   and the single-flight auth token cache
//! - **engine**: retry loop, pagination loop, and bounded multi-request
//!   fan-out
//! - **builders**: the closed set of seed-request strategies
//! - **loader**: per-endpoint orchestration with watermark-driven
//!   incremental time windows
//! - **resolver**: linear endpoint dependency chains
//! - **store** / **events**: collaborator interfaces the engine calls but
//!   does not implement (plus a local-filesystem reference store and
//!   logging/null event publishers)
//!
//! Vendor-specific behavior (auth, paging semantics, response
//! interpretation) lives behind [`adapter::VendorAdapter`]; concrete
//! adapters live in the `apipull-vendors` crate.

pub mod adapter;
pub mod builders;
pub mod engine;
pub mod error;
pub mod events;
pub mod loader;
pub mod metadata;
pub mod model;
pub mod resolver;
pub mod store;

pub use error::{CoreError, Result};
