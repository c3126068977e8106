//! Deterministic request identity hashing
//!
//! A request's identity is the SHA-256 of a canonical text rendering of
//! everything that determines *what* is being asked for: base URL, vendor,
//! endpoint coordinates, route, and the identity-relevant query parameters
//! and headers. Volatile material (auth tokens) and paging-positional
//! parameters are excluded so the same logical request hashes the same
//! across runs; attempt and page context are folded in explicitly when an
//! attempt id or page id is wanted.

use apipull_common::checksum::sha256_hex;

use crate::model::FetchRequest;

/// Case-insensitive exclusion lists for identity hashing.
#[derive(Debug, Clone, Default)]
pub struct IdentityExclusions {
    headers: Vec<String>,
    query_parameters: Vec<String>,
}

impl IdentityExclusions {
    pub fn new(
        headers: impl IntoIterator<Item = impl Into<String>>,
        query_parameters: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            query_parameters: query_parameters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excludes_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn excludes_query_parameter(&self, name: &str) -> bool {
        self.query_parameters
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name))
    }
}

/// Hash the canonical form of a request. `attempt_nr` and `page_nr` are
/// appended as extra lines when present, so request / attempt / page
/// identities never collide.
pub(crate) fn compute_identity(
    base_url: &str,
    vendor_name: &str,
    request: &FetchRequest,
    exclusions: &IdentityExclusions,
    attempt_nr: Option<u32>,
    page_nr: Option<u32>,
) -> String {
    let mut query: Vec<String> = request
        .query_parameters
        .iter()
        .filter(|(k, _)| !exclusions.excludes_query_parameter(k))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    query.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));

    let mut headers: Vec<String> = request
        .request_headers
        .iter()
        .filter(|(k, _)| !exclusions.excludes_header(k))
        .map(|(k, v)| format!("{k}:{v}"))
        .collect();
    headers.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));

    let mut canonical = format!(
        "base_url={}\nvendor={}\nendpoint={}\napi_version={}\nroute={}\nquery={}\nheaders={}",
        base_url,
        vendor_name,
        request.resource_name,
        request.resource_version,
        request.route,
        query.join("&"),
        headers.join("\n"),
    );

    if let Some(attempt) = attempt_nr {
        canonical.push_str(&format!("\nattemptNr={attempt}"));
    }
    if let Some(page) = page_nr {
        canonical.push_str(&format!("\npageNr={page}"));
    }

    sha256_hex(&canonical)
}
