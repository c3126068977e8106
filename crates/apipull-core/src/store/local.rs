//! Local-filesystem store
//!
//! Mirrors the lake path hierarchy on a local folder, so output from dev
//! runs looks exactly like production layout:
//!
//! ```text
//! {root}/{env}/{internal|external}/{domain}/{vendor}/{resource}/{version}/
//!     ingestion_watermark.json
//!     {run_id}/data_{request_id}_p{page}.json
//!     {run_id}/metadata/metadata_{request_id}_p{page}.json
//! ```
//!
//! Version and page numbers are zero-padded to four digits so plain
//! lexicographic listing sorts correctly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::model::FetchResult;

use super::{IngestionCoordinates, IngestionStore};

pub struct LocalFileIngestionStore {
    root: PathBuf,
}

impl LocalFileIngestionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(CoreError::Config(
                "store root folder must not be empty".to_string(),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resource_folder(&self, coordinates: &IngestionCoordinates) -> PathBuf {
        let internal_external = if coordinates.is_external_source {
            "external"
        } else {
            "internal"
        };
        self.root
            .join(&coordinates.environment)
            .join(internal_external)
            .join(&coordinates.domain)
            .join(&coordinates.vendor)
            .join(&coordinates.resource_name)
            .join(format!("{:04}", coordinates.resource_version))
    }
}

#[async_trait]
impl IngestionStore for LocalFileIngestionStore {
    async fn save_result(
        &self,
        coordinates: &IngestionCoordinates,
        result: &FetchResult,
        metadata_json: &str,
    ) -> Result<()> {
        let run_folder = self
            .resource_folder(coordinates)
            .join(result.run.run_id());
        let metadata_folder = run_folder.join("metadata");
        tokio::fs::create_dir_all(&metadata_folder).await?;

        let page = format!("{:04}", result.page_nr);
        let request_id = &result.request.request_id;

        let data_path = run_folder.join(format!("data_{request_id}_p{page}.json"));
        tokio::fs::write(&data_path, result.content()).await?;
        let metadata_path = metadata_folder.join(format!("metadata_{request_id}_p{page}.json"));
        tokio::fs::write(&metadata_path, metadata_json).await?;
        debug!(path = %data_path.display(), "page written");
        Ok(())
    }

    async fn save_watermark(
        &self,
        coordinates: &IngestionCoordinates,
        watermark_json: &str,
    ) -> Result<()> {
        let folder = self.resource_folder(coordinates);
        tokio::fs::create_dir_all(&folder).await?;
        let path = folder.join("ingestion_watermark.json");
        tokio::fs::write(&path, watermark_json).await?;
        debug!(path = %path.display(), "watermark written");
        Ok(())
    }

    async fn load_watermark(
        &self,
        coordinates: &IngestionCoordinates,
    ) -> Result<Option<serde_json::Value>> {
        let path = self
            .resource_folder(coordinates)
            .join("ingestion_watermark.json");
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                // A corrupt watermark means a full-lookback reload, which
                // is safe; surface it in the log and carry on.
                warn!(path = %path.display(), "ignoring unparseable watermark: {err}");
                Ok(None)
            }
        }
    }
}
