//! Ingestion lifecycle events
//!
//! The loader announces run lifecycle and watermark advances through an
//! [`EventPublisher`]. Publishing is strictly best-effort: a downstream
//! notification failure must never fail the load that produced the data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::Result;

/// Well-known event types.
pub mod event_types {
    pub const RUN_STARTED: &str = "ingestion.run.started";
    pub const RUN_COMPLETED: &str = "ingestion.run.completed";
    pub const RUN_FAILED: &str = "ingestion.run.failed";
    pub const WATERMARK_ADVANCED: &str = "ingestion.endpoint.watermark.advanced";
}

/// A lifecycle notification with a free-form data payload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionEvent {
    pub event_type: String,
    /// Originating component, e.g. "apipull/truckercloud".
    pub source: String,
    /// What the event is about, e.g. the endpoint name.
    pub subject: String,
    pub time: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl IngestionEvent {
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        subject: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            subject: subject.into(),
            time: Utc::now(),
            data,
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &IngestionEvent) -> Result<()>;

    /// Flush any buffered events. Called at the end of a run.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Publisher that writes events to the log. The default wiring when no
/// downstream bus is configured.
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: &IngestionEvent) -> Result<()> {
        let data = serde_json::to_string(&event.data)?;
        info!(
            event_type = %event.event_type,
            source = %event.source,
            subject = %event.subject,
            data = %data,
            "ingestion event"
        );
        Ok(())
    }
}

/// Publisher that drops everything. For tests and fully quiet runs.
pub struct NullEventPublisher;

#[async_trait]
impl EventPublisher for NullEventPublisher {
    async fn publish(&self, _event: &IngestionEvent) -> Result<()> {
        Ok(())
    }
}

/// Publish without letting a failure escape; logs and moves on.
pub(crate) async fn publish_quiet(publisher: &dyn EventPublisher, event: IngestionEvent) {
    if let Err(error) = publisher.publish(&event).await {
        warn!(
            event_type = %event.event_type,
            subject = %event.subject,
            "event publish failed: {error}"
        );
    }
}
