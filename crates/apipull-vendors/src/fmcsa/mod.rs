//! FMCSA adapter
//!
//! Public Socrata datasets under `https://data.transportation.gov/resource`.
//! Paging is `$limit`/`$offset` with a 0-based row offset and no counters
//! in the response, so chains run until a page comes back as an empty JSON
//! array. No auth; a 401 here means the dataset moved or the request is
//! malformed, never a stale credential.

pub mod endpoints;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use apipull_core::adapter::{
    build_query_string, default_failure_message, IdentityExclusions, VendorAdapter,
};
use apipull_core::model::{FetchOutcome, FetchRequest, FetchResult};
use apipull_core::{CoreError, Result};

pub const BASE_URL: &str = "https://data.transportation.gov/resource";

const DEFAULT_REQUEST_SIZE: u32 = 500;

pub struct FmcsaAdapter {
    base_url: String,
    exclusions: IdentityExclusions,
}

impl Default for FmcsaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FmcsaAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            // Paging position must not change the logical request identity.
            exclusions: IdentityExclusions::new(Vec::<String>::new(), ["$limit", "$offset"]),
        }
    }

    fn build_paged_request(&self, seed: &FetchRequest, offset: u32, limit: u32) -> FetchRequest {
        let mut next = seed.clone();
        next.request_id.clear();
        next.attempt_id.clear();
        next.query_parameters.remove("$limit");
        next.query_parameters.remove("$offset");
        next.query_parameters
            .insert("$offset".to_string(), offset.to_string());
        next.query_parameters
            .insert("$limit".to_string(), limit.to_string());
        // Stable 1-based sequence for file naming and ordering.
        next.sequence_nr = offset / limit.max(1) + 1;
        next
    }
}

fn body_is_empty(content: &str) -> bool {
    if content.trim().is_empty() {
        return true;
    }
    matches!(
        serde_json::from_str::<Value>(content),
        Ok(Value::Array(items)) if items.is_empty()
    )
}

fn body_is_valid_json(content: &str) -> bool {
    serde_json::from_str::<Value>(content).is_ok()
}

fn query_parameter_u32(parameters: &BTreeMap<String, String>, key: &str) -> Option<u32> {
    parameters.get(key).and_then(|v| v.parse().ok())
}

#[async_trait]
impl VendorAdapter for FmcsaAdapter {
    fn vendor_name(&self) -> &str {
        "Fmcsa"
    }

    fn ingestion_domain(&self) -> &str {
        "CarrierInfo"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn identity_exclusions(&self) -> &IdentityExclusions {
        &self.exclusions
    }

    fn build_request_uri(&self, request: &FetchRequest) -> Result<Url> {
        let route = if request.route.is_empty() {
            request.resource_name.as_str()
        } else {
            request.route.as_str()
        }
        .trim_start_matches('/');

        let mut url = Url::parse(&format!("{}/{}", self.base_url, route))
            .map_err(|e| CoreError::InvalidUri(e.to_string()))?;
        if !request.query_parameters.is_empty() {
            url.set_query(Some(&build_query_string(&request.query_parameters)));
        }
        Ok(url)
    }

    async fn build_request_headers(&self, request: &FetchRequest) -> Result<Vec<(String, String)>> {
        let mut headers = vec![("Accept".to_string(), "*/*".to_string())];
        for (key, value) in &request.request_headers {
            if key.trim().is_empty() || value.trim().is_empty() {
                continue;
            }
            if key.eq_ignore_ascii_case("accept") {
                continue;
            }
            headers.push((key.clone(), value.clone()));
        }
        Ok(headers)
    }

    fn refine_outcome(
        &self,
        _request: &FetchRequest,
        http_status: Option<u16>,
        body: &str,
        _content_type: Option<&str>,
        generic: FetchOutcome,
    ) -> FetchOutcome {
        // There is no credential to refresh.
        if http_status == Some(401) {
            return FetchOutcome::FailPermanent;
        }
        if generic != FetchOutcome::Success {
            return generic;
        }
        if !body.trim().is_empty() && !body_is_valid_json(body) {
            return FetchOutcome::FailPermanent;
        }
        FetchOutcome::Success
    }

    fn build_failure_message(
        &self,
        http_status: Option<u16>,
        reason: Option<&str>,
        outcome: FetchOutcome,
        body: &str,
        transport_error: Option<&reqwest::Error>,
    ) -> String {
        let base = default_failure_message(http_status, reason, outcome, transport_error);
        if transport_error.is_none() {
            if let Some(status) = http_status {
                if (200..300).contains(&status)
                    && !body.trim().is_empty()
                    && !body_is_valid_json(body)
                {
                    return format!("{base}; invalid JSON payload");
                }
            }
        }
        base
    }

    fn post_process_success(&self, result: &mut FetchResult) {
        // Page info comes from the request ($limit/$offset), not the body.
        let limit = query_parameter_u32(&result.request.query_parameters, "$limit")
            .filter(|l| *l > 0)
            .or(result.request.page_size())
            .unwrap_or(DEFAULT_REQUEST_SIZE);
        let offset =
            query_parameter_u32(&result.request.query_parameters, "$offset").unwrap_or(0);
        result.page_size = Some(limit);
        result.page_nr = offset / limit.max(1) + 1;
        // The API reports no counters.
        result.total_pages = Some(1);

        if let Ok(root) = serde_json::from_str::<Value>(result.content()) {
            result.total_elements = Some(root.as_array().map(|a| a.len() as u64).unwrap_or(0));
        }
    }

    fn next_request(
        &self,
        seed: &FetchRequest,
        previous: Option<&FetchResult>,
        step_nr: u32,
    ) -> Result<Option<FetchRequest>> {
        if step_nr == 0 {
            return Err(CoreError::InvalidStepNr(step_nr));
        }

        let paging_enabled =
            seed.pagination.request_size.is_some() || seed.pagination.max_pages.is_some();
        if !paging_enabled {
            if step_nr == 1 {
                let mut first = seed.clone();
                first.sequence_nr = first.sequence_nr.max(1);
                return Ok(Some(first));
            }
            return Ok(None);
        }

        if let Some(max_pages) = seed.pagination.max_pages {
            if step_nr > max_pages {
                return Ok(None);
            }
        }

        let limit = seed.page_size().unwrap_or(DEFAULT_REQUEST_SIZE);
        // StartIndex is a 1-based page start; offset-based vendors turn it
        // into a row offset.
        let start_offset = seed
            .pagination
            .start_index
            .saturating_sub(1)
            .checked_mul(limit)
            .ok_or_else(|| CoreError::Config("start offset overflow".to_string()))?;

        if step_nr == 1 {
            return Ok(Some(self.build_paged_request(seed, start_offset, limit)));
        }
        let Some(previous) = previous else {
            return Ok(None);
        };
        if !previous.fetch_succeeded() {
            return Ok(None);
        }
        // No counters: keep going until a page comes back empty.
        if body_is_empty(previous.content()) {
            return Ok(None);
        }

        let previous_offset =
            query_parameter_u32(&previous.request.query_parameters, "$offset")
                .unwrap_or(start_offset);
        let previous_limit = query_parameter_u32(&previous.request.query_parameters, "$limit")
            .filter(|l| *l > 0)
            .unwrap_or(limit);
        let next_offset = previous_offset
            .checked_add(previous_limit)
            .ok_or_else(|| CoreError::Config("page offset overflow".to_string()))?;
        Ok(Some(self.build_paged_request(seed, next_offset, previous_limit)))
    }

    fn resource_name_friendly(&self, resource_name: &str) -> String {
        endpoints::friendly_name(resource_name)
            .map(String::from)
            .unwrap_or_else(|| resource_name.to_string())
    }

    fn metadata_redact_keys(&self) -> &[&str] {
        &[]
    }
}
