//! Shared test fixtures: a page-numbered vendor adapter pointed at a
//! wiremock server, plus collecting doubles for events and pages.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use url::Url;

use apipull_core::adapter::{build_query_string, IdentityExclusions, VendorAdapter};
use apipull_core::engine::PageSink;
use apipull_core::events::{EventPublisher, IngestionEvent};
use apipull_core::model::{FetchRequest, FetchResult, IngestionRun, RunIdSource};
use apipull_core::Result;

/// Minimal page-numbered vendor: `page`/`size` query parameters, 1-based,
/// with the body reporting `totalPages`.
pub struct PagedTestAdapter {
    base_url: String,
    exclusions: IdentityExclusions,
}

impl PagedTestAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            exclusions: IdentityExclusions::new(["authorization"], ["page", "size"]),
        }
    }
}

#[async_trait]
impl VendorAdapter for PagedTestAdapter {
    fn vendor_name(&self) -> &str {
        "testvendor"
    }

    fn ingestion_domain(&self) -> &str {
        "testing"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn identity_exclusions(&self) -> &IdentityExclusions {
        &self.exclusions
    }

    fn build_request_uri(&self, request: &FetchRequest) -> Result<Url> {
        let route = if request.route.is_empty() {
            format!("v{}/{}", request.resource_version, request.resource_name)
        } else {
            request.route.clone()
        };
        let mut url = Url::parse(&format!("{}/{}", self.base_url.trim_end_matches('/'), route))
            .map_err(|e| apipull_core::CoreError::InvalidUri(e.to_string()))?;
        if !request.query_parameters.is_empty() {
            url.set_query(Some(&build_query_string(&request.query_parameters)));
        }
        Ok(url)
    }

    fn post_process_success(&self, result: &mut FetchResult) {
        if let Ok(body) = serde_json::from_str::<serde_json::Value>(result.content()) {
            result.total_pages = body
                .get("totalPages")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .or(Some(1));
            result.total_elements = body.get("totalElements").and_then(|v| v.as_u64());
        }
    }

    fn next_request(
        &self,
        seed: &FetchRequest,
        previous: Option<&FetchResult>,
        step_nr: u32,
    ) -> Result<Option<FetchRequest>> {
        if step_nr == 0 {
            return Err(apipull_core::CoreError::InvalidStepNr(step_nr));
        }
        if let Some(max_pages) = seed.pagination.max_pages {
            if step_nr > max_pages {
                return Ok(None);
            }
        }
        let mut next = match previous {
            None => {
                let mut first = seed.clone();
                first.sequence_nr = 1;
                first
            }
            Some(previous) => {
                if !previous.fetch_succeeded() {
                    return Ok(None);
                }
                if previous.page_nr >= previous.total_pages.unwrap_or(1) {
                    return Ok(None);
                }
                previous.request.next_in_chain()
            }
        };
        next.query_parameters
            .insert("page".to_string(), next.sequence_nr.to_string());
        if let Some(size) = seed.pagination.request_size {
            next.query_parameters
                .insert("size".to_string(), size.to_string());
        }
        Ok(Some(next))
    }
}

/// Run-id source yielding fixed values so paths are deterministic.
pub struct FixedRunIds;

impl RunIdSource for FixedRunIds {
    fn start_utc(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn suffix(&self) -> String {
        "0042".to_string()
    }
}

pub fn test_run() -> IngestionRun {
    IngestionRun::new(&FixedRunIds, "test", "testing", "testvendor")
}

/// Sink that records every page content it sees.
#[derive(Default)]
pub struct CollectingSink {
    pub pages: Mutex<Vec<String>>,
}

#[async_trait]
impl PageSink for CollectingSink {
    async fn on_page(&self, result: &FetchResult) -> Result<()> {
        self.pages.lock().unwrap().push(result.content().to_string());
        Ok(())
    }
}

/// Publisher that records event types in arrival order.
#[derive(Default)]
pub struct CollectingEvents {
    pub event_types: Mutex<Vec<String>>,
}

#[async_trait]
impl EventPublisher for CollectingEvents {
    async fn publish(&self, event: &IngestionEvent) -> Result<()> {
        self.event_types
            .lock()
            .unwrap()
            .push(event.event_type.clone());
        Ok(())
    }
}
