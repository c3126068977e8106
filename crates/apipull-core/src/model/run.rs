//! Ingestion run identity

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Source of run identity material. The production source reads the wall
/// clock and a random suffix; tests inject fixed values so run ids (and
/// everything derived from them, like storage paths) are deterministic.
pub trait RunIdSource: Send + Sync {
    fn start_utc(&self) -> DateTime<Utc>;

    /// Four-digit, zero-padded collision-avoidance suffix.
    fn suffix(&self) -> String;
}

/// Wall-clock run id source.
pub struct SystemRunIdSource;

impl RunIdSource for SystemRunIdSource {
    fn start_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn suffix(&self) -> String {
        format!("{:04}", rand::thread_rng().gen_range(0..10_000))
    }
}

/// One execution of a load across an endpoint. The run id groups all
/// pages, attempts, and metadata written during the execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRun {
    pub start_utc: DateTime<Utc>,
    suffix: String,
    pub environment_name: String,
    pub ingestion_domain: String,
    pub vendor_name: String,
}

impl IngestionRun {
    pub fn new(
        ids: &dyn RunIdSource,
        environment_name: impl Into<String>,
        ingestion_domain: impl Into<String>,
        vendor_name: impl Into<String>,
    ) -> Self {
        Self::with_parts(
            ids.start_utc(),
            ids.suffix(),
            environment_name,
            ingestion_domain,
            vendor_name,
        )
    }

    /// Construct from explicit parts. Intended for tests and replay.
    pub fn with_parts(
        start_utc: DateTime<Utc>,
        suffix: impl Into<String>,
        environment_name: impl Into<String>,
        ingestion_domain: impl Into<String>,
        vendor_name: impl Into<String>,
    ) -> Self {
        Self {
            start_utc,
            suffix: suffix.into(),
            environment_name: environment_name.into(),
            ingestion_domain: ingestion_domain.into(),
            vendor_name: vendor_name.into(),
        }
    }

    /// Unix epoch milliseconds of the start time concatenated with the
    /// suffix. Sortable by start time, unique enough across workers.
    pub fn run_id(&self) -> String {
        format!("{}{}", self.start_utc.timestamp_millis(), self.suffix)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_id_is_millis_plus_suffix() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let run = IngestionRun::with_parts(start, "0042", "test", "transport", "acme");
        assert_eq!(run.run_id(), format!("{}0042", start.timestamp_millis()));
    }

    #[test]
    fn test_system_source_suffix_is_four_digits() {
        let suffix = SystemRunIdSource.suffix();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }
}
