//! TruckerCloud adapter
//!
//! Telematics aggregator behind `https://api.truckercloud.com/api`.
//! Quirks this adapter owns:
//!
//! - bearer-style auth tokens fetched from `v{n}/authenticate`, cached per
//!   API version and refreshed once on 401
//! - 1-based `page`/`size` paging with counters reported inside the body
//!   under `pagination`
//! - the occasional 200 response whose body is a timeout marker or empty,
//!   both retried as transient

pub mod endpoints;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use url::Url;

use apipull_core::adapter::{
    build_query_string, default_failure_message, IdentityExclusions, TokenCache, VendorAdapter,
};
use apipull_core::model::{FetchOutcome, FetchRequest, FetchResult};
use apipull_core::{CoreError, Result};

pub const BASE_URL: &str = "https://api.truckercloud.com/api";

const DEFAULT_PAGE_SIZE: u32 = 1000;
const VENDOR_TIMEOUT_MARKER: &str = "REQUEST TIMED OUT";

pub struct TruckerCloudAdapter {
    client: reqwest::Client,
    base_url: String,
    api_username: String,
    api_password: String,
    tokens: TokenCache,
    exclusions: IdentityExclusions,
}

impl TruckerCloudAdapter {
    pub fn new(api_username: impl Into<String>, api_password: impl Into<String>) -> Result<Self> {
        Self::with_base_url(BASE_URL, api_username, api_password)
    }

    /// Same adapter against a different base URL; tests point this at a
    /// mock server.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_username: impl Into<String>,
        api_password: impl Into<String>,
    ) -> Result<Self> {
        let api_username = api_username.into();
        let api_password = api_password.into();
        if api_username.trim().is_empty() || api_password.trim().is_empty() {
            return Err(CoreError::Config(
                "TruckerCloud credentials must not be empty".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_username,
            api_password,
            tokens: TokenCache::new(),
            // Auth and paging position must not change the logical
            // request identity.
            exclusions: IdentityExclusions::new(["authorization"], ["page", "size"]),
        })
    }

    async fn fetch_auth_token(&self, api_version: u32) -> Result<String> {
        let uri = format!("{}/v{}/authenticate", self.base_url, api_version);
        let body = serde_json::json!({
            "userName": self.api_username,
            "password": self.api_password,
        });
        let response = self
            .client
            .post(&uri)
            .header("Accept", "*/*")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CoreError::Auth(format!(
                "authenticate returned HTTP {status}"
            )));
        }
        let parsed: Value = serde_json::from_str(&text)
            .map_err(|_| CoreError::Auth("authenticate response is not JSON".to_string()))?;
        parsed
            .get("authToken")
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
            .map(String::from)
            .ok_or_else(|| CoreError::Auth("authenticate response missing authToken".to_string()))
    }

    fn build_paged_request(&self, seed: &FetchRequest, page_nr: u32) -> FetchRequest {
        let mut next = seed.clone();
        next.sequence_nr = page_nr;
        next.request_id.clear();
        next.attempt_id.clear();
        remove_case_insensitive(&mut next.query_parameters, "page");
        remove_case_insensitive(&mut next.query_parameters, "size");
        next.query_parameters
            .insert("page".to_string(), page_nr.to_string());
        next.query_parameters.insert(
            "size".to_string(),
            seed.page_size().unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
        );
        next
    }
}

struct BodyInspection {
    is_empty: bool,
    indicates_vendor_timeout: bool,
    is_valid_json: bool,
}

fn inspect_body(content: &str) -> BodyInspection {
    if content.trim().is_empty() {
        return BodyInspection {
            is_empty: true,
            indicates_vendor_timeout: false,
            is_valid_json: false,
        };
    }
    // Vendor quirk: timeouts sometimes come back as a 200 with an
    // uppercase marker in the body.
    if content
        .to_uppercase()
        .contains(VENDOR_TIMEOUT_MARKER)
    {
        return BodyInspection {
            is_empty: false,
            indicates_vendor_timeout: true,
            is_valid_json: false,
        };
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) if items.is_empty() => BodyInspection {
            is_empty: true,
            indicates_vendor_timeout: false,
            is_valid_json: true,
        },
        Ok(_) => BodyInspection {
            is_empty: false,
            indicates_vendor_timeout: false,
            is_valid_json: true,
        },
        Err(_) => BodyInspection {
            is_empty: false,
            indicates_vendor_timeout: false,
            is_valid_json: false,
        },
    }
}

fn remove_case_insensitive(map: &mut BTreeMap<String, String>, key: &str) {
    let matching: Vec<String> = map
        .keys()
        .filter(|k| k.eq_ignore_ascii_case(key))
        .cloned()
        .collect();
    for k in matching {
        map.remove(&k);
    }
}

#[async_trait]
impl VendorAdapter for TruckerCloudAdapter {
    fn vendor_name(&self) -> &str {
        "TruckerCloud"
    }

    fn ingestion_domain(&self) -> &str {
        "Telematics"
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

        let mut url = Url::parse(&format!(
            "{}/v{}/{}",
            self.base_url, request.resource_version, route
        ))
        .map_err(|e| CoreError::InvalidUri(e.to_string()))?;
        if !request.query_parameters.is_empty() {
            url.set_query(Some(&build_query_string(&request.query_parameters)));
        }
        Ok(url)
    }

    async fn build_request_headers(&self, request: &FetchRequest) -> Result<Vec<(String, String)>> {
        let mut headers = vec![("Accept".to_string(), "*/*".to_string())];

        let token = self
            .tokens
            .get_or_refresh(request.resource_version, || {
                self.fetch_auth_token(request.resource_version)
            })
            .await?;
        headers.push(("Authorization".to_string(), token));

        // Accept and Authorization are owned here; everything else passes
        // through.
        for (key, value) in &request.request_headers {
            if key.trim().is_empty() || value.trim().is_empty() {
                continue;
            }
            if key.eq_ignore_ascii_case("accept") || key.eq_ignore_ascii_case("authorization") {
                continue;
            }
            headers.push((key.clone(), value.clone()));
        }
        Ok(headers)
    }

    fn refine_outcome(
        &self,
        request: &FetchRequest,
        http_status: Option<u16>,
        body: &str,
        _content_type: Option<&str>,
        generic: FetchOutcome,
    ) -> FetchOutcome {
        // A 401 means our cached token is wrong or expired.
        if http_status == Some(401) {
            if let Err(error) = self.tokens.invalidate(request.resource_version) {
                warn!("token invalidation failed: {error}");
            }
            return FetchOutcome::RetryImmediately;
        }
        if generic != FetchOutcome::Success {
            return generic;
        }

        let inspection = inspect_body(body);
        if inspection.indicates_vendor_timeout {
            return FetchOutcome::RetryTransient;
        }
        // Success with an empty body is suspicious; treat it as transient.
        if inspection.is_empty {
            return FetchOutcome::RetryTransient;
        }
        if !inspection.is_valid_json {
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
                if (200..300).contains(&status) {
                    let inspection = inspect_body(body);
                    if inspection.indicates_vendor_timeout {
                        return format!("{base}; vendor body indicates timeout");
                    }
                    if !inspection.is_empty && !inspection.is_valid_json {
                        return format!("{base}; invalid JSON payload");
                    }
                }
            }
        }
        base
    }

    fn post_process_success(&self, result: &mut FetchResult) {
        let Ok(root) = serde_json::from_str::<Value>(result.content()) else {
            return;
        };

        if let Some(pagination) = root.get("pagination").or_else(|| root.get("Pagination")) {
            if let Some(current) = pagination.get("currentPage").and_then(|v| v.as_u64()) {
                result.page_nr = current as u32;
            }
            if let Some(total) = pagination.get("totalPages").and_then(|v| v.as_u64()) {
                result.total_pages = Some(total as u32);
            }
            if let Some(elements) = pagination.get("totalElements").and_then(|v| v.as_u64()) {
                result.total_elements = Some(elements);
            }
            if let Some(size) = pagination
                .get("pageSize")
                .or_else(|| pagination.get("size"))
                .and_then(|v| v.as_u64())
            {
                result.page_size = Some(size as u32);
            }
        }

        if result.total_pages.unwrap_or(0) == 0 {
            result.total_pages = Some(1);
        }
        if result.page_size.is_none() {
            result.page_size = result.request.page_size();
        }
        if result.total_elements.is_none() {
            let content_len = root
                .get("content")
                .or_else(|| root.get("Content"))
                .and_then(|v| v.as_array())
                .map(|a| a.len() as u64);
            result.total_elements = Some(content_len.unwrap_or(0));
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
        if let Some(max_pages) = seed.pagination.max_pages {
            if step_nr > max_pages {
                return Ok(None);
            }
        }

        // Non-paged endpoints: one-and-done.
        if seed.page_size().is_none() {
            if step_nr == 1 {
                let mut first = seed.clone();
                first.sequence_nr = first.sequence_nr.max(1);
                return Ok(Some(first));
            }
            return Ok(None);
        }

        // Pages are 1-based.
        if step_nr == 1 {
            return Ok(Some(self.build_paged_request(seed, 1)));
        }
        let Some(previous) = previous else {
            return Ok(None);
        };
        if !previous.fetch_succeeded() {
            return Ok(None);
        }

        let current_page = previous.page_nr.max(1);
        let total_pages = previous.total_pages.unwrap_or(1).max(1);
        let next_page = current_page + 1;
        if next_page > total_pages {
            return Ok(None);
        }
        Ok(Some(self.build_paged_request(seed, next_page)))
    }

    fn metadata_redact_keys(&self) -> &[&str] {
        &["authorization", "userName", "password"]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apipull_core::model::{IngestionRun, PaginationIntent, SystemRunIdSource};

    fn adapter() -> TruckerCloudAdapter {
        TruckerCloudAdapter::with_base_url("https://tc.test/api", "user", "pass").unwrap()
    }

    fn paged_seed() -> FetchRequest {
        FetchRequest::new("carriers", 4).with_pagination(PaginationIntent {
            start_index: 1,
            request_size: Some(100),
            max_pages: None,
        })
    }

    fn result_for(request: FetchRequest, content: &str, outcome: FetchOutcome) -> FetchResult {
        let run = IngestionRun::new(&SystemRunIdSource, "test", "Telematics", "TruckerCloud");
        let mut result = FetchResult::new(run, request);
        result.set_content(content.to_string());
        result.outcome = outcome;
        result
    }

    #[test]
    fn test_first_step_injects_page_and_size() {
        let adapter = adapter();
        let first = adapter.next_request(&paged_seed(), None, 1).unwrap().unwrap();
        assert_eq!(first.query_parameters.get("page").unwrap(), "1");
        assert_eq!(first.query_parameters.get("size").unwrap(), "100");
        assert_eq!(first.sequence_nr, 1);
    }

    #[test]
    fn test_pagination_follows_body_counters() {
        let adapter = adapter();
        let seed = paged_seed();
        let first = adapter.next_request(&seed, None, 1).unwrap().unwrap();
        let mut previous = result_for(
            first,
            r#"{"pagination":{"currentPage":1,"totalPages":3},"content":[{}]}"#,
            FetchOutcome::Success,
        );
        adapter.post_process_success(&mut previous);
        assert_eq!(previous.total_pages, Some(3));

        let second = adapter.next_request(&seed, Some(&previous), 2).unwrap().unwrap();
        assert_eq!(second.query_parameters.get("page").unwrap(), "2");
        assert_eq!(second.sequence_nr, 2);
    }

    #[test]
    fn test_last_page_ends_the_chain() {
        let adapter = adapter();
        let seed = paged_seed();
        let first = adapter.next_request(&seed, None, 1).unwrap().unwrap();
        let mut previous = result_for(
            first,
            r#"{"pagination":{"currentPage":3,"totalPages":3},"content":[]}"#,
            FetchOutcome::Success,
        );
        adapter.post_process_success(&mut previous);
        assert!(adapter.next_request(&seed, Some(&previous), 4).unwrap().is_none());
    }

    #[test]
    fn test_unpaged_seed_is_one_and_done() {
        let adapter = adapter();
        let seed = FetchRequest::new("carriers", 4);
        assert!(adapter.next_request(&seed, None, 1).unwrap().is_some());
        let previous = result_for(seed.clone(), "{}", FetchOutcome::Success);
        assert!(adapter.next_request(&seed, Some(&previous), 2).unwrap().is_none());
    }

    #[test]
    fn test_max_pages_cap() {
        let adapter = adapter();
        let mut seed = paged_seed();
        seed.pagination.max_pages = Some(2);
        let first = adapter.next_request(&seed, None, 1).unwrap().unwrap();
        let mut previous = result_for(
            first,
            r#"{"pagination":{"currentPage":2,"totalPages":99},"content":[{}]}"#,
            FetchOutcome::Success,
        );
        adapter.post_process_success(&mut previous);
        assert!(adapter.next_request(&seed, Some(&previous), 3).unwrap().is_none());
    }

    #[test]
    fn test_step_nr_zero_is_an_error() {
        let adapter = adapter();
        assert!(matches!(
            adapter.next_request(&paged_seed(), None, 0),
            Err(CoreError::InvalidStepNr(0))
        ));
    }

    #[test]
    fn test_vendor_timeout_body_is_transient() {
        let adapter = adapter();
        let request = paged_seed();
        let outcome = adapter.refine_outcome(
            &request,
            Some(200),
            "REQUEST TIMED OUT",
            None,
            FetchOutcome::Success,
        );
        assert_eq!(outcome, FetchOutcome::RetryTransient);
    }

    #[test]
    fn test_empty_success_body_is_transient() {
        let adapter = adapter();
        let outcome =
            adapter.refine_outcome(&paged_seed(), Some(200), "  ", None, FetchOutcome::Success);
        assert_eq!(outcome, FetchOutcome::RetryTransient);
    }

    #[test]
    fn test_non_json_success_body_is_permanent() {
        let adapter = adapter();
        let outcome = adapter.refine_outcome(
            &paged_seed(),
            Some(200),
            "<html>oops</html>",
            None,
            FetchOutcome::Success,
        );
        assert_eq!(outcome, FetchOutcome::FailPermanent);
    }

    #[test]
    fn test_unauthorized_invalidates_and_retries_immediately() {
        let adapter = adapter();
        let outcome =
            adapter.refine_outcome(&paged_seed(), Some(401), "", None, FetchOutcome::RetryImmediately);
        assert_eq!(outcome, FetchOutcome::RetryImmediately);
    }

    #[test]
    fn test_failure_message_hints_at_vendor_timeout() {
        let adapter = adapter();
        let message = adapter.build_failure_message(
            Some(200),
            Some("OK"),
            FetchOutcome::RetryTransient,
            "REQUEST TIMED OUT",
            None,
        );
        assert!(message.contains("vendor body indicates timeout"));
    }

    #[test]
    fn test_request_uri_includes_version_and_query() {
        let adapter = adapter();
        let request = FetchRequest::new("carriers", 4)
            .with_query_parameter("page", "2")
            .with_query_parameter("size", "100");
        let uri = adapter.build_request_uri(&request).unwrap();
        assert_eq!(uri.as_str(), "https://tc.test/api/v4/carriers?page=2&size=100");
    }
}
