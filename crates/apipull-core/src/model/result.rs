//! Fetch outcome and result types

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apipull_common::checksum::sha256_hex;

use super::{FetchRequest, IngestionRun};

/// Max characters of a response body preserved on a failure record.
pub const FAILURE_BODY_MAX_CHARS: usize = 8192;

/// Classification of a single fetch attempt. Drives the retry loop:
/// `RetryImmediately` skips the backoff delay (credential refresh),
/// `RetryTransient` waits it out, `FailPermanent` stops retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchOutcome {
    #[default]
    NotAttempted,
    Success,
    RetryImmediately,
    RetryTransient,
    FailPermanent,
}

impl FetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchOutcome::NotAttempted => "not_attempted",
            FetchOutcome::Success => "success",
            FetchOutcome::RetryImmediately => "retry_immediately",
            FetchOutcome::RetryTransient => "retry_transient",
            FetchOutcome::FailPermanent => "fail_permanent",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchOutcome::RetryImmediately | FetchOutcome::RetryTransient
        )
    }
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one failed attempt. The full history of a request's
/// failures rides along on the final result, even when a later attempt
/// succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub attempt_nr: u32,
    pub requested_utc: Option<DateTime<Utc>>,
    pub failed_utc: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub message: String,
    /// Response body at failure time, truncated to [`FAILURE_BODY_MAX_CHARS`].
    pub response_body: String,
}

impl FetchFailure {
    pub fn new(
        attempt_nr: u32,
        requested_utc: Option<DateTime<Utc>>,
        http_status: Option<u16>,
        message: impl Into<String>,
        response_body: &str,
    ) -> Self {
        Self {
            attempt_nr,
            requested_utc,
            failed_utc: Utc::now(),
            http_status,
            message: message.into(),
            response_body: truncate_body(response_body),
        }
    }
}

/// Truncate a response body for failure records, marking the cut.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= FAILURE_BODY_MAX_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(FAILURE_BODY_MAX_CHARS).collect();
    out.push_str("...<truncated>");
    out
}

/// Everything known about one fetched page: the request that produced it,
/// the classified outcome, response content and metadata, paging counters
/// reported by the vendor, and the failure history across attempts.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub run: IngestionRun,
    pub request: FetchRequest,

    pub outcome: FetchOutcome,
    pub http_status: Option<u16>,

    content: String,
    // Digest and byte length of `content`, computed lazily and dropped
    // whenever the content changes.
    payload_digest: OnceLock<(String, u64)>,

    pub content_type: Option<String>,
    pub content_encoding: Option<String>,

    /// 1-based page number within the pagination chain.
    pub page_nr: u32,
    /// Identity of this page (request shape + page number).
    pub page_id: String,
    /// Total pages the vendor reports, when it reports one.
    pub total_pages: Option<u32>,
    /// Total rows across all pages, when the vendor reports it.
    pub total_elements: Option<u64>,
    pub page_size: Option<u32>,

    pub request_uri: Option<String>,
    /// Headers actually sent on the last attempt, auth included. Preferred
    /// over `request.request_headers` for audit output.
    pub effective_request_headers: BTreeMap<String, String>,

    pub requested_utc: Option<DateTime<Utc>>,
    pub received_utc: Option<DateTime<Utc>>,

    /// Attempt number of the last attempt made (1-based).
    pub attempt_nr: u32,
    pub failures: Vec<FetchFailure>,
}

impl FetchResult {
    pub fn new(run: IngestionRun, request: FetchRequest) -> Self {
        let page_nr = request.sequence_nr;
        let page_size = request.pagination.request_size;
        Self {
            run,
            request,
            outcome: FetchOutcome::NotAttempted,
            http_status: None,
            content: String::new(),
            payload_digest: OnceLock::new(),
            content_type: None,
            content_encoding: None,
            page_nr,
            page_id: String::new(),
            total_pages: None,
            total_elements: None,
            page_size,
            request_uri: None,
            effective_request_headers: BTreeMap::new(),
            requested_utc: None,
            received_utc: None,
            attempt_nr: 0,
            failures: Vec::new(),
        }
    }

    pub fn fetch_succeeded(&self) -> bool {
        self.outcome == FetchOutcome::Success
    }

    /// Total attempts made: recorded failures plus the successful one.
    pub fn nr_attempts(&self) -> usize {
        self.failures.len() + usize::from(self.fetch_succeeded())
    }

    pub fn response_time_ms(&self) -> Option<i64> {
        match (self.requested_utc, self.received_utc) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the response content. Cached payload digest and byte length
    /// are invalidated; the next digest read recomputes from the new
    /// content. Adapters use this when `post_process_success` rewrites the
    /// body (e.g. wrapping a bare array).
    pub fn set_content(&mut self, content: String) {
        self.content = content;
        self.payload_digest = OnceLock::new();
    }

    /// SHA-256 of the current content, hex-encoded. Computed on first use.
    pub fn payload_sha256(&self) -> &str {
        &self.digest().0
    }

    /// Byte length of the current content.
    pub fn payload_bytes(&self) -> u64 {
        self.digest().1
    }

    fn digest(&self) -> &(String, u64) {
        self.payload_digest
            .get_or_init(|| (sha256_hex(&self.content), self.content.len() as u64))
    }

    /// Reset per-attempt state at the start of a retry. The failure
    /// history is kept; everything derived from the wire is cleared.
    pub(crate) fn begin_attempt(&mut self, attempt_nr: u32) {
        self.attempt_nr = attempt_nr;
        self.outcome = FetchOutcome::NotAttempted;
        self.http_status = None;
        self.set_content(String::new());
        self.content_type = None;
        self.content_encoding = None;
        self.requested_utc = Some(Utc::now());
        self.received_utc = None;
    }
}
