//! Audit metadata for fetched pages
//!
//! Each persisted page gets a flat JSON sidecar describing exactly what
//! was asked, when, how it went, and what came back. Secrets (auth
//! headers, signed query parameters) are redacted by key; the adapter says
//! which keys. The headers recorded are the *effective* ones that went out
//! on the wire, not just the caller's declared intent.

use serde_json::{json, Map, Value};

use crate::adapter::VendorAdapter;
use crate::error::Result;
use crate::model::FetchResult;

const REDACTED: &str = "***REDACTED***";

/// Render the audit document for one fetched page.
pub fn build_metadata_json(result: &FetchResult, adapter: &dyn VendorAdapter) -> Result<String> {
    let redact_keys = adapter.metadata_redact_keys();

    let query_parameters = redacted_map(
        result
            .request
            .query_parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
        redact_keys,
    );

    // Prefer what was actually sent; fall back to declared intent when the
    // request never made it onto the wire.
    let headers: Map<String, Value> = if result.effective_request_headers.is_empty() {
        redacted_map(
            result
                .request
                .request_headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
            redact_keys,
        )
    } else {
        redacted_map(
            result
                .effective_request_headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
            redact_keys,
        )
    };

    let failures: Vec<Value> = result
        .failures
        .iter()
        .map(|failure| {
            json!({
                "attempt_nr": failure.attempt_nr,
                "requested_utc": failure.requested_utc.map(|t| t.to_rfc3339()),
                "failed_utc": failure.failed_utc.to_rfc3339(),
                "http_status": failure.http_status,
                "message": failure.message,
                "response_body": failure.response_body,
            })
        })
        .collect();

    let document = json!({
        "ingestion_run_id": result.run.run_id(),
        "ingestion_run_start_utc": result.run.start_utc.to_rfc3339(),
        "environment": result.run.environment_name,
        "domain": result.run.ingestion_domain,
        "vendor": result.run.vendor_name,
        "resource_name": result.request.resource_name,
        "resource_version": result.request.resource_version,
        "request_id": result.request.request_id,
        "attempt_id": result.request.attempt_id,
        "page_id": result.page_id,
        "page_nr": result.page_nr,
        "attempt_nr": result.attempt_nr,
        "nr_attempts": result.nr_attempts(),
        "http_method": result.request.method.as_str(),
        "request_uri": result.request_uri,
        "query_parameters": query_parameters,
        "request_headers": headers,
        "http_status": result.http_status,
        "outcome": result.outcome.as_str(),
        "page_size": result.page_size,
        "total_pages": result.total_pages,
        "total_elements": result.total_elements,
        "payload_sha256": result.payload_sha256(),
        "payload_bytes": result.payload_bytes(),
        "content_type": result.content_type,
        "content_encoding": result.content_encoding,
        "requested_utc": result.requested_utc.map(|t| t.to_rfc3339()),
        "received_utc": result.received_utc.map(|t| t.to_rfc3339()),
        "response_time_ms": result.response_time_ms(),
        "failures": failures,
    });

    Ok(serde_json::to_string_pretty(&document)?)
}

fn redacted_map<'a>(
    entries: impl Iterator<Item = (&'a str, &'a str)>,
    redact_keys: &[&str],
) -> Map<String, Value> {
    entries
        .map(|(key, value)| {
            let redact = redact_keys.iter().any(|r| r.eq_ignore_ascii_case(key));
            let value = if redact { REDACTED } else { value };
            (key.to_string(), Value::from(value))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::adapter::IdentityExclusions;
    use crate::model::{FetchOutcome, FetchRequest, IngestionRun};
    use chrono::{TimeZone, Utc};
    use url::Url;

    struct StubAdapter {
        exclusions: IdentityExclusions,
    }

    #[async_trait::async_trait]
    impl VendorAdapter for StubAdapter {
        fn vendor_name(&self) -> &str {
            "acme"
        }
        fn ingestion_domain(&self) -> &str {
            "transport"
        }
        fn base_url(&self) -> &str {
            "https://api.example.com"
        }
        fn identity_exclusions(&self) -> &IdentityExclusions {
            &self.exclusions
        }
        fn build_request_uri(&self, _request: &FetchRequest) -> crate::Result<Url> {
            Ok(Url::parse("https://api.example.com/v4/carriers").unwrap())
        }
        fn post_process_success(&self, _result: &mut FetchResult) {}
        fn next_request(
            &self,
            _seed: &FetchRequest,
            _previous: Option<&FetchResult>,
            _step_nr: u32,
        ) -> crate::Result<Option<FetchRequest>> {
            Ok(None)
        }
    }

    #[test]
    fn test_metadata_redacts_auth_and_prefers_effective_headers() {
        let adapter = StubAdapter {
            exclusions: IdentityExclusions::default(),
        };
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let run = IngestionRun::with_parts(start, "0042", "dev", "transport", "acme");
        let request = FetchRequest::new("carriers", 4).with_header("Accept", "application/json");
        let mut result = FetchResult::new(run, request);
        result.outcome = FetchOutcome::Success;
        result.http_status = Some(200);
        result.set_content(r#"{"content":[]}"#.to_string());
        result
            .effective_request_headers
            .insert("Authorization".to_string(), "Bearer secret".to_string());
        result
            .effective_request_headers
            .insert("Accept".to_string(), "application/json".to_string());

        let rendered = build_metadata_json(&result, &adapter).unwrap();
        let document: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(
            document["request_headers"]["Authorization"],
            Value::from(REDACTED)
        );
        assert_eq!(
            document["request_headers"]["Accept"],
            Value::from("application/json")
        );
        assert_eq!(document["outcome"], Value::from("success"));
        assert_eq!(document["http_status"], Value::from(200));
        assert_eq!(document["payload_bytes"], Value::from(14));
        assert!(!rendered.contains("Bearer secret"));
    }

    #[test]
    fn test_metadata_falls_back_to_declared_headers() {
        let adapter = StubAdapter {
            exclusions: IdentityExclusions::default(),
        };
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let run = IngestionRun::with_parts(start, "0042", "dev", "transport", "acme");
        let request = FetchRequest::new("carriers", 4).with_header("Accept", "application/json");
        let result = FetchResult::new(run, request);

        let rendered = build_metadata_json(&result, &adapter).unwrap();
        let document: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            document["request_headers"]["Accept"],
            Value::from("application/json")
        );
        assert_eq!(document["outcome"], Value::from("not_attempted"));
    }
}
