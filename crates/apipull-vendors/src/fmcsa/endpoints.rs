//! FMCSA endpoint catalog
//!
//! All endpoints are simple paged Socrata datasets; none need an
//! iteration list or a time window. Resource names are the opaque Socrata
//! dataset ids, so the friendly names matter for storage paths.

use apipull_core::builders::RequestBuilder;
use apipull_core::model::{EndpointDefinition, EndpointEntry};

const DEFAULT_PAGE_SIZE: u32 = 500;

/// Dataset id to friendly name, in catalog order.
const DATASETS: &[(&str, &str, &str)] = &[
    ("qh9u-swkp.json", "ActPendInsurAllHistory", "Active/pending insurance history."),
    ("9mw4-x3tu.json", "AuthHistoryAllHistory", "Authority history."),
    ("2emp-mxtb.json", "Boc3AllHistory", "BOC-3 process agent history."),
    ("6eyk-hxee.json", "CarrierAllHistory", "Carrier registration history."),
    ("az4n-8mr2.json", "CompanyCensus", "Company census data."),
    ("aayw-vxb3.json", "CrashFile", "Crash file data."),
    ("6sqe-dvqs.json", "InsHistAllWithHistory", "Insurance history (all with history)."),
    ("qbt8-7vic.json", "InspectionsAndCitations", "Inspections and citations."),
    ("wt8s-2hbx.json", "InspectionsPerUnit", "Inspections per unit."),
    ("ypjt-5ydn.json", "InsurAllHistory", "Insurance history."),
    ("96tg-4mhf.json", "RejectedAllHistory", "Rejected filings history."),
    ("sa6p-acbp.json", "RevocationAllHistory", "Revocation history."),
    ("4wxs-vbns.json", "SmsInputCrash", "SMS input: crashes."),
    ("rbkj-cgst.json", "SmsInputInspection", "SMS input: inspections."),
    ("kjg3-diqy.json", "SmsInputMotorCarrierCensus", "SMS input: motor carrier census."),
    ("8mt8-2mdr.json", "SmsInputViolation", "SMS input: violations."),
    ("5qik-smay.json", "SpecialStudies", "Special studies."),
    ("fx4q-ay7w.json", "VehicleInspectionFile", "Vehicle inspection file."),
    ("876r-jsdb.json", "VehicleInspectionsAndViolations", "Vehicle inspections and violations."),
];

/// Friendly name for a dataset id, if it is a known dataset.
pub fn friendly_name(resource_name: &str) -> Option<&'static str> {
    DATASETS
        .iter()
        .find(|(id, _, _)| id.eq_ignore_ascii_case(resource_name))
        .map(|(_, name, _)| *name)
}

/// The full FMCSA catalog, keyed by friendly name.
pub fn catalog() -> Vec<EndpointEntry> {
    DATASETS
        .iter()
        .map(|(id, name, description)| {
            EndpointEntry::new(
                *name,
                EndpointDefinition::new(*id, *name, 1, RequestBuilder::Simple)
                    .with_page_size(DEFAULT_PAGE_SIZE)
                    .with_description(*description),
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_all_datasets() {
        let catalog = catalog();
        assert_eq!(catalog.len(), DATASETS.len());
        assert!(catalog.iter().all(|e| e.definition.default_page_size == Some(500)));
        assert!(catalog.iter().all(|e| !e.definition.requires_iteration_list));
    }

    #[test]
    fn test_friendly_name_is_case_insensitive() {
        assert_eq!(friendly_name("QH9U-SWKP.JSON"), Some("ActPendInsurAllHistory"));
        assert_eq!(friendly_name("nope.json"), None);
    }
}
