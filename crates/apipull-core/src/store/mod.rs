//! Persistence interface for fetched data and watermarks

mod local;

pub use local::LocalFileIngestionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::FetchResult;

/// Where a resource's data lands. Every path component is part of the
/// contract with downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionCoordinates {
    pub environment: String,
    pub is_external_source: bool,
    pub domain: String,
    pub vendor: String,
    pub resource_name: String,
    pub resource_version: u32,
}

#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Persist one fetched page: payload plus its audit metadata sidecar.
    /// Whether and when this is called is the loader's decision.
    async fn save_result(
        &self,
        coordinates: &IngestionCoordinates,
        result: &FetchResult,
        metadata_json: &str,
    ) -> Result<()>;

    /// Persist the endpoint watermark document, replacing any previous one.
    async fn save_watermark(
        &self,
        coordinates: &IngestionCoordinates,
        watermark_json: &str,
    ) -> Result<()>;

    /// Load the current watermark document, if one exists.
    async fn load_watermark(
        &self,
        coordinates: &IngestionCoordinates,
    ) -> Result<Option<serde_json::Value>>;
}
