//! The generic fetch engine
//!
//! Three nested loops, innermost first:
//!
//! 1. **perform_fetch** — one request, retried per the outcome
//!    classification until success, permanent failure, or attempt
//!    exhaustion. Every failed attempt leaves a failure record.
//! 2. **process_request** — one pagination chain, driven by the adapter's
//!    `next_request`. Pages are fetched sequentially; each successful page
//!    is handed to the sink before the next is requested.
//! 3. **process_requests** — many chains fanned out with bounded
//!    concurrency. A fetch failure in one chain never cancels the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::VendorAdapter;
use crate::error::{CoreError, Result};
use crate::model::{FetchFailure, FetchOutcome, FetchRequest, FetchResult, HttpMethod, IngestionRun};

/// Callback invoked for each successfully fetched page, before the next
/// page in the chain is requested. Used by the loader to persist pages as
/// they arrive rather than after the whole chain completes.
#[async_trait]
pub trait PageSink: Send + Sync {
    async fn on_page(&self, result: &FetchResult) -> Result<()>;
}

/// Sink that does nothing; for callers that only want the returned results.
pub struct NullPageSink;

#[async_trait]
impl PageSink for NullPageSink {
    async fn on_page(&self, _result: &FetchResult) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FetchEngineConfig {
    /// Upper bound on pagination chains fetched concurrently.
    pub max_parallelism: usize,

    /// Retries after the first attempt; total attempts is this plus one.
    pub max_retries: u32,

    /// Delay before a `RetryTransient` re-attempt. Fixed rather than
    /// exponential: with few retries and rate limits that reset on a
    /// fixed cadence, a steady delay recovers as well and stays
    /// predictable.
    pub retry_delay: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for FetchEngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 4,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(120),
        }
    }
}

pub struct FetchEngine {
    adapter: Arc<dyn VendorAdapter>,
    client: reqwest::Client,
    config: FetchEngineConfig,
}

impl FetchEngine {
    pub fn new(adapter: Arc<dyn VendorAdapter>, config: FetchEngineConfig) -> Result<Self> {
        if adapter.base_url().trim().is_empty() {
            return Err(CoreError::Config(format!(
                "adapter '{}' has an empty base URL",
                adapter.vendor_name()
            )));
        }
        if config.max_parallelism == 0 {
            return Err(CoreError::Config(
                "max_parallelism must be at least 1".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            adapter,
            client,
            config,
        })
    }

    pub fn adapter(&self) -> &Arc<dyn VendorAdapter> {
        &self.adapter
    }

    /// Fan out several pagination chains with bounded concurrency.
    /// Results come back grouped per chain, in completion order.
    pub async fn process_requests(
        &self,
        run: &IngestionRun,
        requests: Vec<FetchRequest>,
        sink: &dyn PageSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchResult>> {
        let nr_chains = requests.len();
        debug!(
            vendor = self.adapter.vendor_name(),
            nr_chains,
            max_parallelism = self.config.max_parallelism,
            "dispatching request chains"
        );

        let chains = stream::iter(
            requests
                .into_iter()
                .map(|seed| self.process_request(run, seed, sink, cancel)),
        )
        .buffer_unordered(self.config.max_parallelism)
        .collect::<Vec<_>>()
        .await;

        let mut results = Vec::new();
        for chain in chains {
            results.extend(chain?);
        }
        Ok(results)
    }

    /// Fetch one pagination chain to completion. The adapter decides when
    /// the chain ends; a failed page ends it early with the failure
    /// recorded on the returned result.
    pub async fn process_request(
        &self,
        run: &IngestionRun,
        seed: FetchRequest,
        sink: &dyn PageSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchResult>> {
        let mut results: Vec<FetchResult> = Vec::new();
        let mut step_nr: u32 = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let next = self
                .adapter
                .next_request(&seed, results.last(), step_nr)?;
            let Some(request) = next else { break };

            let result = self.perform_fetch(run, request, cancel).await?;
            let succeeded = result.fetch_succeeded();
            if succeeded {
                sink.on_page(&result).await?;
            }
            results.push(result);
            if !succeeded {
                break;
            }
            step_nr += 1;
        }

        Ok(results)
    }

    /// Fetch one request with retries. Returns `Err` only for
    /// cancellation or non-fetch faults; a request that exhausts its
    /// attempts comes back as a result with `FailPermanent` or
    /// `RetryTransient` and a full failure history.
    pub async fn perform_fetch(
        &self,
        run: &IngestionRun,
        mut request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResult> {
        let uri = self.adapter.build_request_uri(&request)?;
        request.request_id = self.adapter.compute_request_id(&request);

        let mut result = FetchResult::new(run.clone(), request);
        result.request_uri = Some(uri.to_string());

        let max_attempts = self.config.max_retries.saturating_add(1).max(1);

        for attempt_nr in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            result.request.attempt_id = self.adapter.compute_attempt_id(&result.request, attempt_nr);
            result.begin_attempt(attempt_nr);

            let headers = self.adapter.build_request_headers(&result.request).await?;
            result.effective_request_headers = headers
                .iter()
                .cloned()
                .collect::<BTreeMap<String, String>>();

            let (status, reason, transport_error) =
                self.dispatch(&uri, &headers, &mut result, cancel).await?;

            if result.fetch_succeeded() {
                self.adapter.post_process_success(&mut result);
                result.page_id = self.adapter.compute_page_id(&result.request, result.page_nr);
                debug!(
                    vendor = self.adapter.vendor_name(),
                    endpoint = %result.request.resource_name,
                    page_nr = result.page_nr,
                    attempt_nr,
                    status = status.unwrap_or(0),
                    "fetch succeeded"
                );
                return Ok(result);
            }

            let message = self.adapter.build_failure_message(
                status,
                reason.as_deref(),
                result.outcome,
                result.content(),
                transport_error.as_ref(),
            );
            warn!(
                vendor = self.adapter.vendor_name(),
                endpoint = %result.request.resource_name,
                attempt_nr,
                status = status.unwrap_or(0),
                outcome = %result.outcome,
                "fetch attempt failed: {message}"
            );
            result.failures.push(FetchFailure::new(
                attempt_nr,
                result.requested_utc,
                status,
                message,
                result.content(),
            ));

            let exhausted = attempt_nr >= max_attempts;
            match result.outcome {
                FetchOutcome::RetryImmediately if !exhausted => continue,
                FetchOutcome::RetryTransient if !exhausted => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
                _ => break,
            }
        }

        result.page_id = self.adapter.compute_page_id(&result.request, result.page_nr);
        info!(
            vendor = self.adapter.vendor_name(),
            endpoint = %result.request.resource_name,
            nr_failures = result.failures.len(),
            outcome = %result.outcome,
            "request gave up after {} attempt(s)",
            result.failures.len()
        );
        Ok(result)
    }

    /// Send one attempt over the wire and classify it onto `result`.
    /// Returns the pieces the failure message needs.
    async fn dispatch(
        &self,
        uri: &url::Url,
        headers: &[(String, String)],
        result: &mut FetchResult,
        cancel: &CancellationToken,
    ) -> Result<(Option<u16>, Option<String>, Option<reqwest::Error>)> {
        let mut builder = match result.request.method {
            HttpMethod::Get => self.client.get(uri.clone()),
            HttpMethod::Post => self
                .client
                .post(uri.clone())
                .header("Content-Type", "application/json")
                .body(result.request.body_params_json.clone()),
        };
        for (key, value) in headers {
            builder = builder.header(key, value);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            response = builder.send() => response,
        };

        match response {
            Ok(response) => {
                let status = response.status();
                result.http_status = Some(status.as_u16());
                result.content_type = header_value(&response, "content-type");
                result.content_encoding = header_value(&response, "content-encoding");
                let reason = status.canonical_reason().map(String::from);

                let body = tokio::select! {
                    _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                    body = response.text() => body,
                };
                result.received_utc = Some(Utc::now());

                match body {
                    Ok(body) => {
                        result.set_content(body);
                        let generic = classify_status(Some(status.as_u16()));
                        result.outcome = self.adapter.refine_outcome(
                            &result.request,
                            Some(status.as_u16()),
                            result.content(),
                            result.content_type.as_deref(),
                            generic,
                        );
                        Ok((Some(status.as_u16()), reason, None))
                    }
                    Err(err) => {
                        result.outcome = self.adapter.refine_outcome(
                            &result.request,
                            Some(status.as_u16()),
                            "",
                            None,
                            classify_transport_error(&err),
                        );
                        Ok((Some(status.as_u16()), reason, Some(err)))
                    }
                }
            }
            Err(err) => {
                result.received_utc = Some(Utc::now());
                let generic = classify_transport_error(&err);
                result.outcome =
                    self.adapter
                        .refine_outcome(&result.request, None, "", None, generic);
                Ok((None, None, Some(err)))
            }
        }
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Generic status classification, refined later by the adapter:
/// 2xx succeeds, 401 retries immediately (credential refresh), 408/429
/// and 5xx retry after a delay, all other statuses fail permanently.
pub fn classify_status(http_status: Option<u16>) -> FetchOutcome {
    match http_status {
        Some(status) if (200..300).contains(&status) => FetchOutcome::Success,
        Some(401) => FetchOutcome::RetryImmediately,
        Some(408) | Some(429) => FetchOutcome::RetryTransient,
        Some(status) if status >= 500 => FetchOutcome::RetryTransient,
        Some(_) => FetchOutcome::FailPermanent,
        None => FetchOutcome::FailPermanent,
    }
}

/// Timeouts and connection-level failures are worth retrying; anything
/// structurally wrong with the request is not.
pub fn classify_transport_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        FetchOutcome::RetryTransient
    } else {
        FetchOutcome::FailPermanent
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_bands() {
        assert_eq!(classify_status(Some(200)), FetchOutcome::Success);
        assert_eq!(classify_status(Some(204)), FetchOutcome::Success);
        assert_eq!(classify_status(Some(401)), FetchOutcome::RetryImmediately);
        assert_eq!(classify_status(Some(408)), FetchOutcome::RetryTransient);
        assert_eq!(classify_status(Some(429)), FetchOutcome::RetryTransient);
        assert_eq!(classify_status(Some(500)), FetchOutcome::RetryTransient);
        assert_eq!(classify_status(Some(503)), FetchOutcome::RetryTransient);
        assert_eq!(classify_status(Some(403)), FetchOutcome::FailPermanent);
        assert_eq!(classify_status(Some(404)), FetchOutcome::FailPermanent);
        assert_eq!(classify_status(None), FetchOutcome::FailPermanent);
    }

    #[test]
    fn test_default_config() {
        let config = FetchEngineConfig::default();
        assert_eq!(config.max_parallelism, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }
}
