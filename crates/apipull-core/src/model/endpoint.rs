//! Endpoint catalog types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::builders::RequestBuilder;

use super::{FetchResult, HttpMethod};

/// When fetched pages are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveBehavior {
    /// Persist every result, failures included, once the whole chain has
    /// been fetched (default).
    #[default]
    AfterAll,
    /// Persist each successful page as soon as it arrives.
    PerPage,
    /// Nothing persisted (dependency prefetches, dry runs).
    None,
}

impl std::str::FromStr for SaveBehavior {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "after-all" | "afterall" | "all" => Ok(SaveBehavior::AfterAll),
            "per-page" | "perpage" => Ok(SaveBehavior::PerPage),
            "none" => Ok(SaveBehavior::None),
            _ => Err(format!("invalid save behavior: {s}")),
        }
    }
}

impl std::fmt::Display for SaveBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SaveBehavior::AfterAll => "after-all",
            SaveBehavior::PerPage => "per-page",
            SaveBehavior::None => "none",
        };
        f.write_str(s)
    }
}

/// Inputs handed to a [`RequestBuilder`] when seeding requests for a load.
pub struct LoadParameters<'a> {
    /// Prior results a dependent endpoint iterates over (e.g. the carrier
    /// pages a per-carrier endpoint expands into one request each).
    pub iteration_list: Option<&'a [FetchResult]>,

    /// Resolved incremental time window, when the endpoint uses one.
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: Option<DateTime<Utc>>,

    /// Raw JSON body for POST endpoints.
    pub body_params_json: &'a str,
}

impl<'a> LoadParameters<'a> {
    pub fn empty() -> Self {
        Self {
            iteration_list: None,
            start_utc: None,
            end_utc: None,
            body_params_json: "",
        }
    }
}

/// Static description of one vendor endpoint: identity, paging defaults,
/// time-window policy, dependency declaration, and the strategy that turns
/// load parameters into seed requests.
#[derive(Clone)]
pub struct EndpointDefinition {
    /// Resource name as it appears in the vendor API.
    pub resource_name: String,

    /// Name used for storage paths and operator-facing output.
    pub friendly_name: String,

    pub resource_version: u32,

    pub method: HttpMethod,

    /// Rows per page when paged; `None` for unpaged endpoints.
    pub default_page_size: Option<u32>,

    /// How far back the first incremental load reaches when no watermark
    /// exists and no explicit window was given.
    pub default_lookback_days: i64,

    /// Windows shorter than this are skipped entirely rather than fetched.
    pub min_time_span: Option<Duration>,

    /// Windows longer than this are clamped by pulling the end in.
    pub max_time_span: Option<Duration>,

    /// Whether loads advance a persisted watermark.
    pub supports_watermark: bool,

    /// Whether seeding requires the results of a dependency load.
    pub requires_iteration_list: bool,

    /// Name of the catalog entry this endpoint depends on, if any.
    pub depends_on: Option<String>,

    pub description: Option<String>,

    pub build_requests: RequestBuilder,
}

impl EndpointDefinition {
    pub fn new(
        resource_name: impl Into<String>,
        friendly_name: impl Into<String>,
        resource_version: u32,
        build_requests: RequestBuilder,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            friendly_name: friendly_name.into(),
            resource_version,
            method: HttpMethod::Get,
            default_page_size: None,
            default_lookback_days: 90,
            min_time_span: None,
            max_time_span: None,
            supports_watermark: false,
            requires_iteration_list: false,
            depends_on: None,
            description: None,
            build_requests,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = Some(page_size);
        self
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.default_lookback_days = days;
        self
    }

    pub fn with_min_time_span(mut self, span: Duration) -> Self {
        self.min_time_span = Some(span);
        self
    }

    pub fn with_max_time_span(mut self, span: Duration) -> Self {
        self.max_time_span = Some(span);
        self
    }

    pub fn with_watermark(mut self) -> Self {
        self.supports_watermark = true;
        self
    }

    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on = Some(name.into());
        self.requires_iteration_list = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named catalog entry. The entry name is what operators and dependency
/// declarations refer to; several entries may share a resource name at
/// different versions.
#[derive(Clone)]
pub struct EndpointEntry {
    pub name: String,
    pub definition: EndpointDefinition,
}

impl EndpointEntry {
    pub fn new(name: impl Into<String>, definition: EndpointDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }
}
