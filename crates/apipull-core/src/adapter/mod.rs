//! The per-vendor strategy contract
//!
//! Everything vendor-specific sits behind [`VendorAdapter`]: how request
//! URIs are assembled, which headers carry auth, how paging advances, and
//! how ambiguous responses are interpreted. The engine stays generic and
//! consults the adapter at each decision point.

mod identity;
mod token_cache;

pub use identity::IdentityExclusions;
pub use token_cache::TokenCache;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::model::{FetchOutcome, FetchRequest, FetchResult};

/// Vendor strategy consulted by the fetch engine.
///
/// Implementations must be cheap to share (`Arc<dyn VendorAdapter>`); any
/// mutable state (token caches, counters) belongs behind interior
/// synchronization.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// Stable lowercase vendor identifier, used in storage paths and
    /// request identities.
    fn vendor_name(&self) -> &str;

    /// Business domain the vendor's data lands under, e.g. "transport".
    fn ingestion_domain(&self) -> &str;

    /// Base URL all routes are resolved against.
    fn base_url(&self) -> &str;

    /// Whether the vendor is an external party (affects storage layout).
    fn is_external_source(&self) -> bool {
        true
    }

    /// Parameters and headers excluded from request identity hashing:
    /// anything volatile (auth tokens) or paging-positional (page/offset
    /// parameters, which are folded in separately via the page number).
    fn identity_exclusions(&self) -> &IdentityExclusions;

    /// Resolve the absolute request URI, query string included.
    fn build_request_uri(&self, request: &FetchRequest) -> Result<Url>;

    /// Headers to send on the wire, auth included. Async because auth may
    /// require a token refresh round trip. The default sends the caller's
    /// declared headers, skipping blank values.
    async fn build_request_headers(&self, request: &FetchRequest) -> Result<Vec<(String, String)>> {
        Ok(request
            .request_headers
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Refine the engine's generic status classification with vendor
    /// knowledge (e.g. a vendor that returns 200 with an error envelope,
    /// or one whose 401 is never recoverable). The default keeps the
    /// generic classification.
    fn refine_outcome(
        &self,
        _request: &FetchRequest,
        _http_status: Option<u16>,
        _body: &str,
        _content_type: Option<&str>,
        generic: FetchOutcome,
    ) -> FetchOutcome {
        generic
    }

    /// Human-readable failure summary for the audit trail. Vendors
    /// override to append hints recognized in the body.
    fn build_failure_message(
        &self,
        http_status: Option<u16>,
        reason: Option<&str>,
        outcome: FetchOutcome,
        _body: &str,
        transport_error: Option<&reqwest::Error>,
    ) -> String {
        default_failure_message(http_status, reason, outcome, transport_error)
    }

    /// Hook run after a successful fetch, before the page is handed to
    /// the sink. Adapters extract paging counters from the body here and
    /// may rewrite the content into a canonical envelope.
    fn post_process_success(&self, result: &mut FetchResult);

    /// The pagination decision point. Called with `step_nr` starting at 1;
    /// `previous` is `None` on the first call. Return the request for the
    /// next page, or `None` to end the chain (last page reached, safety
    /// cap hit, or unpaged endpoint already satisfied).
    fn next_request(
        &self,
        seed: &FetchRequest,
        previous: Option<&FetchResult>,
        step_nr: u32,
    ) -> Result<Option<FetchRequest>>;

    /// Storage-friendly name for a resource. Defaults to the resource
    /// name itself.
    fn resource_name_friendly(&self, resource_name: &str) -> String {
        resource_name.to_string()
    }

    /// Header names whose values must be redacted in audit metadata.
    fn metadata_redact_keys(&self) -> &[&str] {
        &["authorization"]
    }

    // === Request identity ===

    /// Identity of the request shape, stable across attempts and runs.
    fn compute_request_id(&self, request: &FetchRequest) -> String {
        identity::compute_identity(
            self.base_url(),
            self.vendor_name(),
            request,
            self.identity_exclusions(),
            None,
            None,
        )
    }

    /// Identity of one attempt at the request.
    fn compute_attempt_id(&self, request: &FetchRequest, attempt_nr: u32) -> String {
        identity::compute_identity(
            self.base_url(),
            self.vendor_name(),
            request,
            self.identity_exclusions(),
            Some(attempt_nr),
            None,
        )
    }

    /// Identity of one page within the request's chain.
    fn compute_page_id(&self, request: &FetchRequest, page_nr: u32) -> String {
        identity::compute_identity(
            self.base_url(),
            self.vendor_name(),
            request,
            self.identity_exclusions(),
            None,
            Some(page_nr),
        )
    }
}

/// Standard failure summary: status line or transport error, plus the
/// classified outcome.
pub fn default_failure_message(
    http_status: Option<u16>,
    reason: Option<&str>,
    outcome: FetchOutcome,
    transport_error: Option<&reqwest::Error>,
) -> String {
    match (http_status, transport_error) {
        (Some(status), _) => {
            let reason = reason.unwrap_or("unknown");
            format!("HTTP {status} {reason} -> {outcome}")
        }
        (None, Some(err)) => format!("transport error: {err} -> {outcome}"),
        (None, None) => format!("no response -> {outcome}"),
    }
}

/// Percent-encode query parameters into a query string with keys in the
/// map's (sorted) order.
pub fn build_query_string<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_failure_message_with_status() {
        let message =
            default_failure_message(Some(503), Some("Service Unavailable"), FetchOutcome::RetryTransient, None);
        assert_eq!(message, "HTTP 503 Service Unavailable -> retry_transient");
    }

    #[test]
    fn test_default_failure_message_without_response() {
        let message = default_failure_message(None, None, FetchOutcome::FailPermanent, None);
        assert_eq!(message, "no response -> fail_permanent");
    }

    #[test]
    fn test_build_query_string_encodes_values() {
        let mut params = std::collections::BTreeMap::new();
        params.insert("carrierCode".to_string(), "AB CD".to_string());
        params.insert("size".to_string(), "100".to_string());
        assert_eq!(build_query_string(&params), "carrierCode=AB+CD&size=100");
    }
}
