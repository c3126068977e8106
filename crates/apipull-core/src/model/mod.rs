//! Domain types for the fetch engine

mod endpoint;
mod request;
mod result;
mod run;

pub use endpoint::{EndpointDefinition, EndpointEntry, LoadParameters, SaveBehavior};
pub use request::{FetchRequest, HttpMethod, PaginationIntent};
pub use result::{FetchFailure, FetchOutcome, FetchResult, FAILURE_BODY_MAX_CHARS};
pub use run::{IngestionRun, RunIdSource, SystemRunIdSource};
