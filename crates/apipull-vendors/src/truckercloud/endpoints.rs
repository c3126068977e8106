//! TruckerCloud endpoint catalog
//!
//! Most endpoints iterate over the carrier list, so they declare a
//! dependency on `CarriersV4` and extract carrier code rows from its
//! pages. Codes of type `TCID` are TruckerCloud-internal identifiers and
//! are filtered out everywhere.

use std::collections::BTreeMap;

use apipull_core::builders::RequestBuilder;
use apipull_core::model::{EndpointDefinition, EndpointEntry, FetchResult, HttpMethod};
use chrono::Duration;

use crate::jsonq::quick_query;

const TIME_FORMAT_SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIME_FORMAT_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// All carriers. Iteration source for most TruckerCloud endpoints.
pub fn carriers_v4() -> EndpointDefinition {
    EndpointDefinition::new("carriers", "Carriers", 4, RequestBuilder::Simple)
        .with_page_size(1000)
        .with_description("All carriers. Iteration source for most TruckerCloud endpoints.")
}

/// All vehicles. Iteration source for vehicle ignition.
pub fn vehicles_v4() -> EndpointDefinition {
    EndpointDefinition::new("vehicles", "Vehicles", 4, RequestBuilder::Simple)
        .with_page_size(1000)
        .with_description("All vehicles. Iteration source for VehicleIgnitionV4.")
}

pub fn subscriptions_v4() -> EndpointDefinition {
    EndpointDefinition::new("subscriptions", "Subscriptions", 4, RequestBuilder::Simple)
        .with_page_size(1000)
        .with_description("All subscriptions.")
}

/// Drivers per carrier.
pub fn drivers_v4() -> EndpointDefinition {
    EndpointDefinition::new(
        "drivers",
        "Drivers",
        4,
        RequestBuilder::Dependent {
            extract: extract_carrier_codes,
        },
    )
    .with_page_size(1000)
    .with_depends_on("CarriersV4")
    .with_description("Drivers per carrier.")
}

/// Risk scores per carrier.
pub fn risk_scores_v4() -> EndpointDefinition {
    EndpointDefinition::new(
        "risk-scores",
        "RiskScores",
        4,
        RequestBuilder::Dependent {
            extract: extract_carrier_codes,
        },
    )
    .with_page_size(1000)
    .with_depends_on("CarriersV4")
    .with_description("Risk scores per carrier.")
}

/// Vehicle ignition data per vehicle.
///
/// WARNING: known to return extremely large payloads (900K+ lines per
/// vehicle) with no date filtering.
pub fn vehicle_ignition_v4() -> EndpointDefinition {
    EndpointDefinition::new(
        "vehicles/ignition",
        "VehicleIgnition",
        4,
        RequestBuilder::Dependent {
            extract: extract_vehicle_rows,
        },
    )
    .with_page_size(1000)
    .with_depends_on("VehiclesV4")
    .with_description("Vehicle ignition data. WARNING: very large payloads.")
}

/// Safety events per carrier+ELD within a time window. POST endpoint; the
/// window is formatted with millisecond precision.
pub fn safety_events_v5() -> EndpointDefinition {
    EndpointDefinition::new(
        "safety-events",
        "SafetyEvents",
        5,
        RequestBuilder::DependentWithWindow {
            extract: extract_carrier_codes_and_eld_short_names,
            start_param: "startTime",
            end_param: "endTime",
            time_format: TIME_FORMAT_MILLIS,
        },
    )
    .with_method(HttpMethod::Post)
    .with_page_size(100)
    .with_watermark()
    .with_min_time_span(Duration::hours(12))
    .with_depends_on("CarriersV4")
    .with_description("Safety events per carrier+ELD within a time window.")
}

pub fn radius_of_operation_v4() -> EndpointDefinition {
    EndpointDefinition::new(
        "radius-of-operation",
        "RadiusOfOperation",
        4,
        RequestBuilder::DependentWithWindow {
            extract: extract_carrier_codes_and_eld_short_names,
            start_param: "startTime",
            end_param: "endTime",
            time_format: TIME_FORMAT_SECONDS,
        },
    )
    .with_page_size(1000)
    .with_watermark()
    .with_min_time_span(Duration::hours(12))
    .with_depends_on("CarriersV4")
    .with_description("Radius of operation within a time window.")
}

pub fn gps_miles_v4() -> EndpointDefinition {
    EndpointDefinition::new(
        "enriched-data/gps-miles",
        "GpsMiles",
        4,
        RequestBuilder::DependentWithWindow {
            extract: extract_carrier_codes_and_eld_standard_names,
            start_param: "startDateTime",
            end_param: "endDateTime",
            time_format: TIME_FORMAT_SECONDS,
        },
    )
    .with_page_size(1000)
    .with_watermark()
    .with_min_time_span(Duration::hours(12))
    .with_depends_on("CarriersV4")
    .with_description("GPS miles within a time window.")
}

pub fn zip_code_miles_v4() -> EndpointDefinition {
    EndpointDefinition::new(
        "enriched-data/zip-code-miles",
        "ZipCodeMiles",
        4,
        RequestBuilder::DependentWithWindow {
            extract: extract_carrier_codes_and_eld_standard_names,
            start_param: "startDateTime",
            end_param: "endDateTime",
            time_format: TIME_FORMAT_SECONDS,
        },
    )
    .with_page_size(1000)
    .with_watermark()
    .with_min_time_span(Duration::hours(12))
    .with_depends_on("CarriersV4")
    .with_description("Zip code miles within a time window.")
}

/// Trip data within a time window. The vendor rejects windows of a full
/// day or more, hence the just-under-24h maximum.
pub fn trips_v5() -> EndpointDefinition {
    EndpointDefinition::new(
        "trips",
        "Trips",
        5,
        RequestBuilder::DependentWithWindow {
            extract: extract_carrier_codes_and_eld_standard_names,
            start_param: "startDateTime",
            end_param: "endDateTime",
            time_format: TIME_FORMAT_SECONDS,
        },
    )
    .with_page_size(1000)
    .with_watermark()
    .with_min_time_span(Duration::hours(8))
    .with_max_time_span(Duration::days(1) - Duration::seconds(1))
    .with_depends_on("CarriersV4")
    .with_description("Trip data within a time window (max ~24h).")
}

/// The full TruckerCloud catalog, keyed by the names dependency
/// declarations use.
pub fn catalog() -> Vec<EndpointEntry> {
    vec![
        EndpointEntry::new("CarriersV4", carriers_v4()),
        EndpointEntry::new("VehiclesV4", vehicles_v4()),
        EndpointEntry::new("SubscriptionsV4", subscriptions_v4()),
        EndpointEntry::new("DriversV4", drivers_v4()),
        EndpointEntry::new("RiskScoresV4", risk_scores_v4()),
        EndpointEntry::new("VehicleIgnitionV4", vehicle_ignition_v4()),
        EndpointEntry::new("SafetyEventsV5", safety_events_v5()),
        EndpointEntry::new("RadiusOfOperationV4", radius_of_operation_v4()),
        EndpointEntry::new("GpsMilesV4", gps_miles_v4()),
        EndpointEntry::new("ZipCodeMilesV4", zip_code_miles_v4()),
        EndpointEntry::new("TripsV5", trips_v5()),
    ]
}

// === Row extractors ===

fn page_contents(results: &[FetchResult]) -> Vec<&str> {
    results
        .iter()
        .map(|r| r.content())
        .filter(|c| !c.trim().is_empty())
        .collect()
}

fn is_internal_code(row: &BTreeMap<String, String>) -> bool {
    row.get("CarrierCodeType")
        .or_else(|| row.get("CodeType"))
        .map(|t| t.eq_ignore_ascii_case("TCID"))
        .unwrap_or(false)
}

/// One row per carrier code: `carrierCode` + `codeType`.
fn extract_carrier_codes(carriers: &[FetchResult]) -> Vec<BTreeMap<String, String>> {
    quick_query(
        page_contents(carriers),
        &[
            ("CarrierCodeType", "carrierInfo.carrierInfoCodes[*].codeType"),
            ("CarrierCode", "carrierInfo.carrierInfoCodes[*].carrierCode"),
        ],
        true,
        "content",
    )
    .into_iter()
    .filter(|row| !is_internal_code(row))
    .map(|row| {
        let mut params = BTreeMap::new();
        params.insert("carrierCode".to_string(), row["CarrierCode"].clone());
        params.insert("codeType".to_string(), row["CarrierCodeType"].clone());
        params
    })
    .collect()
}

fn carrier_code_and_eld_rows(carriers: &[FetchResult]) -> Vec<BTreeMap<String, String>> {
    quick_query(
        page_contents(carriers),
        &[
            ("CarrierCodeType", "carrierInfo.carrierInfoCodes[*].codeType"),
            ("CarrierCode", "carrierInfo.carrierInfoCodes[*].carrierCode"),
            ("EldVendor", "eldVendorInfo.[*].eldVendor"),
        ],
        true,
        "content",
    )
    .into_iter()
    .filter(|row| !is_internal_code(row))
    .collect()
}

/// Carrier+ELD rows with the short parameter names most endpoints take.
fn extract_carrier_codes_and_eld_short_names(
    carriers: &[FetchResult],
) -> Vec<BTreeMap<String, String>> {
    carrier_code_and_eld_rows(carriers)
        .into_iter()
        .map(|row| {
            let mut params = BTreeMap::new();
            params.insert("carrierCode".to_string(), row["CarrierCode"].clone());
            params.insert("codeType".to_string(), row["CarrierCodeType"].clone());
            params.insert("eldVendor".to_string(), row["EldVendor"].clone());
            params
        })
        .collect()
}

/// GpsMiles, ZipCodeMiles, and Trips use longer query parameter key names
/// than the other carrier+ELD endpoints.
fn extract_carrier_codes_and_eld_standard_names(
    carriers: &[FetchResult],
) -> Vec<BTreeMap<String, String>> {
    carrier_code_and_eld_rows(carriers)
        .into_iter()
        .map(|row| {
            let mut params = BTreeMap::new();
            params.insert("carrierCodeValue".to_string(), row["CarrierCode"].clone());
            params.insert("carrierCodeType".to_string(), row["CarrierCodeType"].clone());
            params.insert("eldVendor".to_string(), row["EldVendor"].clone());
            params
        })
        .collect()
}

/// One row per vehicle with its carrier code and ELD vendor.
fn extract_vehicle_rows(vehicles: &[FetchResult]) -> Vec<BTreeMap<String, String>> {
    quick_query(
        page_contents(vehicles),
        &[
            ("CarrierCode", "carrierCodes[*].carrierCode"),
            ("CodeType", "carrierCodes[*].codeType"),
            ("EldVendor", "eldVendors[*].eldVendor"),
            ("VehicleId", "assetEldId"),
        ],
        true,
        "content",
    )
    .into_iter()
    .filter(|row| !is_internal_code(row))
    .filter(|row| {
        ["CarrierCode", "EldVendor", "VehicleId"]
            .iter()
            .all(|key| row.get(*key).map(|v| !v.trim().is_empty()).unwrap_or(false))
    })
    .map(|row| {
        let mut params = BTreeMap::new();
        params.insert("carrierCode".to_string(), row["CarrierCode"].clone());
        params.insert("codeType".to_string(), row["CodeType"].clone());
        params.insert("eldVendor".to_string(), row["EldVendor"].clone());
        params.insert("vehicleId".to_string(), row["VehicleId"].clone());
        params.insert("vehicleIdType".to_string(), "assetEldId".to_string());
        params
    })
    .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apipull_core::model::{FetchRequest, IngestionRun, SystemRunIdSource};
    use apipull_core::resolver::resolve_chain;

    fn carriers_page(content: &str) -> FetchResult {
        let run = IngestionRun::new(&SystemRunIdSource, "test", "Telematics", "TruckerCloud");
        let mut result = FetchResult::new(run, FetchRequest::new("carriers", 4));
        result.set_content(content.to_string());
        result
    }

    const CARRIERS: &str = r#"{
        "content": [
            {
                "carrierInfo": {
                    "carrierInfoCodes": [
                        {"codeType": "DOT", "carrierCode": "12345"},
                        {"codeType": "TCID", "carrierCode": "tc-0001"}
                    ]
                },
                "eldVendorInfo": [{"eldVendor": "samsara"}]
            }
        ]
    }"#;

    #[test]
    fn test_tcid_codes_are_filtered_out() {
        let pages = vec![carriers_page(CARRIERS)];
        let rows = extract_carrier_codes(&pages);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["carrierCode"], "12345");
        assert_eq!(rows[0]["codeType"], "DOT");
    }

    #[test]
    fn test_eld_extractors_use_their_param_names() {
        let pages = vec![carriers_page(CARRIERS)];

        let short = extract_carrier_codes_and_eld_short_names(&pages);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0]["carrierCode"], "12345");
        assert_eq!(short[0]["eldVendor"], "samsara");

        let standard = extract_carrier_codes_and_eld_standard_names(&pages);
        assert_eq!(standard.len(), 1);
        assert_eq!(standard[0]["carrierCodeValue"], "12345");
        assert_eq!(standard[0]["carrierCodeType"], "DOT");
    }

    #[test]
    fn test_vehicle_rows_require_all_identifiers() {
        let vehicles = vec![carriers_page(
            r#"{
                "content": [
                    {
                        "assetEldId": "veh-1",
                        "carrierCodes": [{"carrierCode": "12345", "codeType": "DOT"}],
                        "eldVendors": [{"eldVendor": "samsara"}]
                    },
                    {
                        "assetEldId": "",
                        "carrierCodes": [{"carrierCode": "99999", "codeType": "DOT"}],
                        "eldVendors": [{"eldVendor": "keeptruckin"}]
                    }
                ]
            }"#,
        )];
        let rows = extract_vehicle_rows(&vehicles);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["vehicleId"], "veh-1");
        assert_eq!(rows[0]["vehicleIdType"], "assetEldId");
    }

    #[test]
    fn test_catalog_dependencies_resolve() {
        let catalog = catalog();
        for entry in &catalog {
            let chain = resolve_chain(&catalog, &entry.name).unwrap();
            assert_eq!(chain.last().unwrap().name, entry.name);
        }
        let trips = resolve_chain(&catalog, "TripsV5").unwrap();
        let names: Vec<&str> = trips.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["CarriersV4", "TripsV5"]);
    }

    #[test]
    fn test_trips_window_policy() {
        let trips = trips_v5();
        assert!(trips.supports_watermark);
        assert_eq!(trips.min_time_span, Some(Duration::hours(8)));
        assert_eq!(
            trips.max_time_span,
            Some(Duration::days(1) - Duration::seconds(1))
        );
    }
}
