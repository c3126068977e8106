//! Seed-request strategies
//!
//! A [`RequestBuilder`] turns an endpoint definition plus load parameters
//! into the seed requests for a load. The set is closed: every endpoint
//! in a catalog uses one of these three shapes, which keeps catalogs
//! declarative and the strategies independently testable.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::model::{EndpointDefinition, FetchRequest, LoadParameters, PaginationIntent, FetchResult};

/// Extracts one query-parameter map per wanted request from prior results.
/// Plain function pointers so builders stay `Clone` and catalogs can be
/// built from statics.
pub type RowExtractor = fn(&[FetchResult]) -> Vec<BTreeMap<String, String>>;

#[derive(Clone)]
pub enum RequestBuilder {
    /// One request, no prior data needed. Simple paged or unpaged
    /// endpoints.
    Simple,

    /// One request per row extracted from a dependency's results, e.g.
    /// one per carrier.
    Dependent { extract: RowExtractor },

    /// Like `Dependent`, with the resolved time window injected into each
    /// request's query parameters. `time_format` is a chrono format
    /// string.
    DependentWithWindow {
        extract: RowExtractor,
        start_param: &'static str,
        end_param: &'static str,
        time_format: &'static str,
    },
}

impl RequestBuilder {
    /// Build the seed requests for a load.
    pub fn build(
        &self,
        definition: &EndpointDefinition,
        page_size: Option<u32>,
        max_pages: Option<u32>,
        parameters: &LoadParameters<'_>,
    ) -> Result<Vec<FetchRequest>> {
        let pagination = PaginationIntent {
            start_index: 1,
            request_size: page_size,
            max_pages,
        };
        let seed = || {
            FetchRequest::new(&definition.resource_name, definition.resource_version)
                .with_method(definition.method)
                .with_pagination(pagination.clone())
        };

        match self {
            RequestBuilder::Simple => Ok(vec![seed()]),

            RequestBuilder::Dependent { extract } => {
                let rows = extract(iteration_list(definition, parameters)?);
                Ok(rows
                    .into_iter()
                    .map(|query_parameters| {
                        let mut request = seed();
                        if !parameters.body_params_json.is_empty() {
                            request = request.with_body_json(parameters.body_params_json);
                        }
                        request.query_parameters = query_parameters;
                        request
                    })
                    .collect())
            }

            RequestBuilder::DependentWithWindow {
                extract,
                start_param,
                end_param,
                time_format,
            } => {
                let (start, end) = match (parameters.start_utc, parameters.end_utc) {
                    (Some(start), Some(end)) => (start, end),
                    _ => {
                        return Err(CoreError::Config(format!(
                            "endpoint '{}' requires a resolved time window",
                            definition.resource_name
                        )))
                    }
                };
                let rows = extract(iteration_list(definition, parameters)?);
                Ok(rows
                    .into_iter()
                    .map(|mut query_parameters| {
                        query_parameters.insert(
                            (*start_param).to_string(),
                            start.format(time_format).to_string(),
                        );
                        query_parameters.insert(
                            (*end_param).to_string(),
                            end.format(time_format).to_string(),
                        );
                        let mut request = seed();
                        if !parameters.body_params_json.is_empty() {
                            request = request.with_body_json(parameters.body_params_json);
                        }
                        request.query_parameters = query_parameters;
                        request
                    })
                    .collect())
            }
        }
    }
}

fn iteration_list<'a>(
    definition: &EndpointDefinition,
    parameters: &'a LoadParameters<'_>,
) -> Result<&'a [FetchResult]> {
    parameters
        .iteration_list
        .ok_or_else(|| CoreError::MissingIterationList(definition.resource_name.clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{HttpMethod, IngestionRun, SystemRunIdSource};
    use chrono::{TimeZone, Utc};

    fn page_with_content(content: &str) -> FetchResult {
        let run = IngestionRun::new(&SystemRunIdSource, "test", "transport", "acme");
        let mut result = FetchResult::new(run, FetchRequest::new("carriers", 4));
        result.set_content(content.to_string());
        result
    }

    fn carrier_codes(results: &[FetchResult]) -> Vec<BTreeMap<String, String>> {
        results
            .iter()
            .map(|r| {
                let mut row = BTreeMap::new();
                row.insert("carrierCode".to_string(), r.content().to_string());
                row
            })
            .collect()
    }

    #[test]
    fn test_simple_builds_one_request() {
        let definition =
            EndpointDefinition::new("carriers", "carriers", 4, RequestBuilder::Simple);
        let requests = definition
            .build_requests
            .build(&definition, Some(100), Some(500), &LoadParameters::empty())
            .unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].resource_name, "carriers");
        assert_eq!(requests[0].pagination.request_size, Some(100));
        assert_eq!(requests[0].pagination.max_pages, Some(500));
        assert_eq!(requests[0].method, HttpMethod::Get);
    }

    #[test]
    fn test_dependent_builds_one_request_per_row() {
        let definition = EndpointDefinition::new(
            "drivers",
            "drivers",
            4,
            RequestBuilder::Dependent {
                extract: carrier_codes,
            },
        );
        let pages = vec![page_with_content("CARRIER-A"), page_with_content("CARRIER-B")];
        let parameters = LoadParameters {
            iteration_list: Some(&pages),
            ..LoadParameters::empty()
        };

        let requests = definition
            .build_requests
            .build(&definition, Some(50), None, &parameters)
            .unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].query_parameters.get("carrierCode").unwrap(),
            "CARRIER-A"
        );
        assert_eq!(
            requests[1].query_parameters.get("carrierCode").unwrap(),
            "CARRIER-B"
        );
    }

    #[test]
    fn test_dependent_without_iteration_list_is_an_error() {
        let definition = EndpointDefinition::new(
            "drivers",
            "drivers",
            4,
            RequestBuilder::Dependent {
                extract: carrier_codes,
            },
        );
        let result = definition
            .build_requests
            .build(&definition, None, None, &LoadParameters::empty());
        assert!(matches!(result, Err(CoreError::MissingIterationList(_))));
    }

    #[test]
    fn test_window_parameters_formatted_into_each_request() {
        let definition = EndpointDefinition::new(
            "safety-events",
            "safety_events",
            5,
            RequestBuilder::DependentWithWindow {
                extract: carrier_codes,
                start_param: "startDateTime",
                end_param: "endDateTime",
                time_format: "%Y-%m-%dT%H:%M:%SZ",
            },
        );
        let pages = vec![page_with_content("CARRIER-A")];
        let parameters = LoadParameters {
            iteration_list: Some(&pages),
            start_utc: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            end_utc: Some(Utc.with_ymd_and_hms(2026, 1, 2, 12, 30, 0).unwrap()),
            body_params_json: "",
        };

        let requests = definition
            .build_requests
            .build(&definition, None, None, &parameters)
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].query_parameters.get("startDateTime").unwrap(),
            "2026-01-01T00:00:00Z"
        );
        assert_eq!(
            requests[0].query_parameters.get("endDateTime").unwrap(),
            "2026-01-02T12:30:00Z"
        );
    }

    #[test]
    fn test_window_builder_requires_resolved_window() {
        let definition = EndpointDefinition::new(
            "safety-events",
            "safety_events",
            5,
            RequestBuilder::DependentWithWindow {
                extract: carrier_codes,
                start_param: "startTime",
                end_param: "endTime",
                time_format: "%Y-%m-%dT%H:%M:%SZ",
            },
        );
        let pages = vec![page_with_content("CARRIER-A")];
        let parameters = LoadParameters {
            iteration_list: Some(&pages),
            ..LoadParameters::empty()
        };
        let result = definition
            .build_requests
            .build(&definition, None, None, &parameters);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
