//! Request intent types
//!
//! A [`FetchRequest`] describes *what* to fetch, never *how it went*; the
//! mutable outcome state lives on `FetchResult`. Requests are cheap to
//! clone, which is how pagination works: each page is a fresh copy of the
//! seed with the paging parameters advanced.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// HTTP verb for a vendor call. Only the verbs vendor endpoints actually
/// use are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative paging hints carried on the seed request. The adapter owns
/// the actual paging protocol; these are only the knobs it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationIntent {
    /// First page index the vendor expects (1 for page-numbered APIs,
    /// 0 for offset-based ones).
    pub start_index: u32,

    /// Rows per page, when the endpoint is paged.
    pub request_size: Option<u32>,

    /// Safety cap on the number of pages a chain may fetch before the
    /// adapter stops issuing next requests.
    pub max_pages: Option<u32>,
}

impl Default for PaginationIntent {
    fn default() -> Self {
        Self {
            start_index: 1,
            request_size: None,
            max_pages: None,
        }
    }
}

/// Immutable description of a single vendor API call.
///
/// `request_id` and `attempt_id` are deterministic SHA-256 identities
/// computed by the adapter from the request's canonical form; they start
/// empty and are filled in by the engine just before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Vendor resource name, e.g. "carriers".
    pub resource_name: String,

    /// Vendor API version the resource is served under.
    pub resource_version: u32,

    /// Path relative to the adapter's base URL, without a leading slash.
    pub route: String,

    pub method: HttpMethod,

    /// Query parameters as sent on the wire. Ordered map so the canonical
    /// identity form is deterministic.
    pub query_parameters: BTreeMap<String, String>,

    /// Headers the caller intends to send. Auth headers are typically
    /// added later by the adapter; see `FetchResult::effective_request_headers`
    /// for what actually went out.
    pub request_headers: BTreeMap<String, String>,

    /// Raw JSON body for POST endpoints; empty for GET.
    pub body_params_json: String,

    pub pagination: PaginationIntent,

    /// 1-based position of this request within its pagination chain.
    pub sequence_nr: u32,

    /// Identity of the request shape (no attempt/page context).
    pub request_id: String,

    /// Identity of the current attempt; changes per retry.
    pub attempt_id: String,
}

impl FetchRequest {
    pub fn new(resource_name: impl Into<String>, resource_version: u32) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_version,
            route: String::new(),
            method: HttpMethod::Get,
            query_parameters: BTreeMap::new(),
            request_headers: BTreeMap::new(),
            // Empty JSON object rather than an empty string: POST bodies
            // go out with Content-Type application/json.
            body_params_json: "{}".to_string(),
            pagination: PaginationIntent::default(),
            sequence_nr: 1,
            request_id: String::new(),
            attempt_id: String::new(),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_query_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body_json(mut self, body: impl Into<String>) -> Self {
        self.body_params_json = body.into();
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationIntent) -> Self {
        self.pagination = pagination;
        self
    }

    /// Rows-per-page hint, if the endpoint is paged.
    pub fn page_size(&self) -> Option<u32> {
        self.pagination.request_size
    }

    /// Copy this request as the next page in a chain. Identity fields are
    /// cleared so the adapter recomputes them for the new page shape.
    pub fn next_in_chain(&self) -> Self {
        let mut next = self.clone();
        next.sequence_nr = self.sequence_nr + 1;
        next.request_id.clear();
        next.attempt_id.clear();
        next
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let request = FetchRequest::new("carriers", 4)
            .with_route("v4/carriers")
            .with_query_parameter("size", "100")
            .with_header("Accept", "application/json");

        assert_eq!(request.resource_name, "carriers");
        assert_eq!(request.resource_version, 4);
        assert_eq!(request.route, "v4/carriers");
        assert_eq!(request.query_parameters.get("size").unwrap(), "100");
        assert_eq!(request.sequence_nr, 1);
        assert_eq!(request.method, HttpMethod::Get);
    }

    #[test]
    fn test_next_in_chain_advances_sequence_and_clears_identity() {
        let mut seed = FetchRequest::new("carriers", 4).with_route("v4/carriers");
        seed.request_id = "abc".to_string();
        seed.attempt_id = "def".to_string();

        let next = seed.next_in_chain();
        assert_eq!(next.sequence_nr, 2);
        assert!(next.request_id.is_empty());
        assert!(next.attempt_id.is_empty());
        assert_eq!(next.route, seed.route);
    }

    #[test]
    fn test_pagination_defaults() {
        let pagination = PaginationIntent::default();
        assert_eq!(pagination.start_index, 1);
        assert!(pagination.request_size.is_none());
        assert!(pagination.max_pages.is_none());
    }
}
