//! Per-endpoint load orchestration
//!
//! The loader owns one load of one endpoint: resolve the incremental time
//! window from the stored watermark, seed requests through the endpoint's
//! builder, run them through the engine, persist per page or after the
//! fact per [`SaveBehavior`], then advance the watermark and announce
//! lifecycle events. Event publishing is best-effort; persistence is not.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::VendorAdapter;
use crate::engine::{FetchEngine, NullPageSink, PageSink};
use crate::error::Result;
use crate::events::{event_types, publish_quiet, EventPublisher, IngestionEvent};
use crate::metadata::build_metadata_json;
use crate::model::{
    EndpointDefinition, FetchResult, IngestionRun, LoadParameters, RunIdSource, SaveBehavior,
};
use crate::store::{IngestionCoordinates, IngestionStore};

/// Caller knobs for one load.
pub struct LoadOptions<'a> {
    /// Results of the dependency endpoint, for dependent builders.
    pub iteration_list: Option<&'a [FetchResult]>,

    /// Explicit window bounds; each side independently overrides the
    /// watermark-derived value.
    pub override_start_utc: Option<DateTime<Utc>>,
    pub override_end_utc: Option<DateTime<Utc>>,

    /// Rows per page; defaults to the endpoint's declared page size.
    pub page_size: Option<u32>,

    /// Safety cap on pages per chain.
    pub max_pages: Option<u32>,

    pub save_behavior: SaveBehavior,

    /// Whether a fully successful load advances the watermark. Dependency
    /// prefetches and dry runs pass `false`.
    pub save_watermark: bool,

    /// Raw JSON body for POST endpoints.
    pub body_params_json: String,
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        Self {
            iteration_list: None,
            override_start_utc: None,
            override_end_utc: None,
            page_size: None,
            max_pages: None,
            save_behavior: SaveBehavior::AfterAll,
            save_watermark: true,
            body_params_json: "{}".to_string(),
        }
    }
}

/// Outcome of resolving an incremental window against policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowDecision {
    /// No window applies (endpoint has no watermark support and no
    /// overrides were given).
    NotWindowed,
    /// Window too short to bother the vendor with; skip the load.
    SkipTooShort {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Window {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Resolve the load window: explicit overrides win, then one second past
/// the previous watermark, then the endpoint's default lookback. Windows
/// under the endpoint's minimum are skipped; windows over the maximum are
/// clamped by pulling the end in.
pub fn resolve_window(
    definition: &EndpointDefinition,
    previous_end: Option<DateTime<Utc>>,
    override_start: Option<DateTime<Utc>>,
    override_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> WindowDecision {
    if !definition.supports_watermark && override_start.is_none() && override_end.is_none() {
        return WindowDecision::NotWindowed;
    }

    let start = override_start
        .or_else(|| previous_end.map(|end| end + Duration::seconds(1)))
        .unwrap_or_else(|| now - Duration::days(definition.default_lookback_days));
    let mut end = override_end.unwrap_or(now);

    if let Some(min_span) = definition.min_time_span {
        if end - start < min_span {
            return WindowDecision::SkipTooShort { start, end };
        }
    }
    if let Some(max_span) = definition.max_time_span {
        if end - start > max_span {
            end = start + max_span;
        }
    }
    WindowDecision::Window { start, end }
}

pub struct EndpointLoader {
    engine: FetchEngine,
    store: Arc<dyn IngestionStore>,
    events: Arc<dyn EventPublisher>,
    run_ids: Arc<dyn RunIdSource>,
    environment_name: String,
}

struct SavingSink<'a> {
    store: &'a dyn IngestionStore,
    adapter: &'a dyn VendorAdapter,
    coordinates: &'a IngestionCoordinates,
}

#[async_trait::async_trait]
impl PageSink for SavingSink<'_> {
    async fn on_page(&self, result: &FetchResult) -> Result<()> {
        let metadata = build_metadata_json(result, self.adapter)?;
        self.store
            .save_result(self.coordinates, result, &metadata)
            .await
    }
}

impl EndpointLoader {
    pub fn new(
        engine: FetchEngine,
        store: Arc<dyn IngestionStore>,
        events: Arc<dyn EventPublisher>,
        run_ids: Arc<dyn RunIdSource>,
        environment_name: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            store,
            events,
            run_ids,
            environment_name: environment_name.into(),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn VendorAdapter> {
        self.engine.adapter()
    }

    /// Execute one load of `definition`. Returns every page fetched,
    /// failed pages included; the caller inspects outcomes.
    pub async fn load(
        &self,
        definition: &EndpointDefinition,
        options: LoadOptions<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchResult>> {
        let adapter = self.engine.adapter().clone();
        let coordinates = self.coordinates(&adapter, definition);
        let run = IngestionRun::new(
            self.run_ids.as_ref(),
            &self.environment_name,
            adapter.ingestion_domain(),
            adapter.vendor_name(),
        );
        let source = format!("apipull/{}", adapter.vendor_name());

        // === Window resolution ===
        let previous_end = if definition.supports_watermark {
            self.previous_watermark_end(&coordinates).await?
        } else {
            None
        };
        let window = resolve_window(
            definition,
            previous_end,
            options.override_start_utc,
            options.override_end_utc,
            Utc::now(),
        );
        let (start_utc, end_utc) = match window {
            WindowDecision::NotWindowed => (None, None),
            WindowDecision::SkipTooShort { start, end } => {
                info!(
                    endpoint = %definition.friendly_name,
                    start = %start,
                    end = %end,
                    "window below minimum span; nothing to load"
                );
                return Ok(Vec::new());
            }
            WindowDecision::Window { start, end } => (Some(start), Some(end)),
        };

        info!(
            run_id = %run.run_id(),
            vendor = adapter.vendor_name(),
            endpoint = %definition.friendly_name,
            start = start_utc.map(|t| t.to_rfc3339()).unwrap_or_default(),
            end = end_utc.map(|t| t.to_rfc3339()).unwrap_or_default(),
            "load started"
        );
        publish_quiet(
            self.events.as_ref(),
            IngestionEvent::new(
                event_types::RUN_STARTED,
                &source,
                &definition.friendly_name,
                run_data(&run, start_utc, end_utc),
            ),
        )
        .await;

        let outcome = self
            .execute(definition, &options, &run, &coordinates, start_utc, end_utc, cancel)
            .await;

        match outcome {
            Ok(results) => {
                let nr_failed = results.iter().filter(|r| !r.fetch_succeeded()).count();
                let all_succeeded = nr_failed == 0 && !results.is_empty();

                if all_succeeded
                    && definition.supports_watermark
                    && options.save_watermark
                {
                    if let (Some(start), Some(end)) = (start_utc, end_utc) {
                        self.advance_watermark(&coordinates, &run, definition, &source, start, end)
                            .await?;
                    }
                }

                let mut data = run_data(&run, start_utc, end_utc);
                data.insert("nr_pages".to_string(), Value::from(results.len()));
                data.insert("nr_failed".to_string(), Value::from(nr_failed));
                data.insert(
                    "duration_ms".to_string(),
                    Value::from((Utc::now() - run.start_utc).num_milliseconds()),
                );
                publish_quiet(
                    self.events.as_ref(),
                    IngestionEvent::new(
                        event_types::RUN_COMPLETED,
                        &source,
                        &definition.friendly_name,
                        data,
                    ),
                )
                .await;
                if let Err(error) = self.events.flush().await {
                    warn!("event flush failed: {error}");
                }

                info!(
                    run_id = %run.run_id(),
                    endpoint = %definition.friendly_name,
                    nr_pages = results.len(),
                    nr_failed,
                    "load completed"
                );
                Ok(results)
            }
            Err(error) => {
                let mut data = run_data(&run, start_utc, end_utc);
                data.insert("error".to_string(), Value::from(error.to_string()));
                publish_quiet(
                    self.events.as_ref(),
                    IngestionEvent::new(
                        event_types::RUN_FAILED,
                        &source,
                        &definition.friendly_name,
                        data,
                    ),
                )
                .await;
                if let Err(flush_error) = self.events.flush().await {
                    warn!("event flush failed: {flush_error}");
                }
                Err(error)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        definition: &EndpointDefinition,
        options: &LoadOptions<'_>,
        run: &IngestionRun,
        coordinates: &IngestionCoordinates,
        start_utc: Option<DateTime<Utc>>,
        end_utc: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchResult>> {
        let adapter = self.engine.adapter().clone();
        let parameters = LoadParameters {
            iteration_list: options.iteration_list,
            start_utc,
            end_utc,
            body_params_json: &options.body_params_json,
        };
        let page_size = options.page_size.or(definition.default_page_size);
        let requests = definition.build_requests.build(
            definition,
            page_size,
            options.max_pages,
            &parameters,
        )?;

        let saving = SavingSink {
            store: self.store.as_ref(),
            adapter: adapter.as_ref(),
            coordinates,
        };
        // Per-page persists successful pages as they stream out of the
        // engine; after-all persists everything, failures included, once
        // the whole chain is back.
        let sink: &dyn PageSink = match options.save_behavior {
            SaveBehavior::PerPage => &saving,
            SaveBehavior::AfterAll | SaveBehavior::None => &NullPageSink,
        };
        let results = self
            .engine
            .process_requests(run, requests, sink, cancel)
            .await?;
        if options.save_behavior == SaveBehavior::AfterAll {
            for result in &results {
                saving.on_page(result).await?;
            }
        }
        Ok(results)
    }

    fn coordinates(
        &self,
        adapter: &Arc<dyn VendorAdapter>,
        definition: &EndpointDefinition,
    ) -> IngestionCoordinates {
        let resource_name = if definition.friendly_name.is_empty() {
            adapter.resource_name_friendly(&definition.resource_name)
        } else {
            definition.friendly_name.clone()
        };
        IngestionCoordinates {
            environment: self.environment_name.clone(),
            is_external_source: adapter.is_external_source(),
            domain: adapter.ingestion_domain().to_string(),
            vendor: adapter.vendor_name().to_string(),
            resource_name,
            resource_version: definition.resource_version,
        }
    }

    async fn previous_watermark_end(
        &self,
        coordinates: &IngestionCoordinates,
    ) -> Result<Option<DateTime<Utc>>> {
        let Some(watermark) = self.store.load_watermark(coordinates).await? else {
            return Ok(None);
        };
        let end = watermark
            .get("EndTimeUtc")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        if end.is_none() {
            warn!(
                resource = %coordinates.resource_name,
                "watermark present but EndTimeUtc missing or unparseable; using default lookback"
            );
        }
        Ok(end)
    }

    async fn advance_watermark(
        &self,
        coordinates: &IngestionCoordinates,
        run: &IngestionRun,
        definition: &EndpointDefinition,
        source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let watermark = json!({
            "StartTimeUtc": start.to_rfc3339(),
            "EndTimeUtc": end.to_rfc3339(),
            "IngestionRunId": run.run_id(),
            "IngestionRunStartDts": run.start_utc.to_rfc3339(),
            "WrittenUtc": Utc::now().to_rfc3339(),
            "IngestionDurationMs": (Utc::now() - run.start_utc).num_milliseconds(),
        });
        self.store
            .save_watermark(coordinates, &serde_json::to_string_pretty(&watermark)?)
            .await?;

        let mut data = Map::new();
        data.insert("run_id".to_string(), Value::from(run.run_id()));
        data.insert("StartTimeUtc".to_string(), Value::from(start.to_rfc3339()));
        data.insert("EndTimeUtc".to_string(), Value::from(end.to_rfc3339()));
        publish_quiet(
            self.events.as_ref(),
            IngestionEvent::new(
                event_types::WATERMARK_ADVANCED,
                source,
                &definition.friendly_name,
                data,
            ),
        )
        .await;
        Ok(())
    }
}

fn run_data(
    run: &IngestionRun,
    start_utc: Option<DateTime<Utc>>,
    end_utc: Option<DateTime<Utc>>,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("run_id".to_string(), Value::from(run.run_id()));
    data.insert("vendor".to_string(), Value::from(run.vendor_name.clone()));
    if let Some(start) = start_utc {
        data.insert("window_start_utc".to_string(), Value::from(start.to_rfc3339()));
    }
    if let Some(end) = end_utc {
        data.insert("window_end_utc".to_string(), Value::from(end.to_rfc3339()));
    }
    data
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::builders::RequestBuilder;
    use chrono::TimeZone;

    fn definition() -> EndpointDefinition {
        EndpointDefinition::new("trips", "trips", 5, RequestBuilder::Simple)
            .with_watermark()
            .with_lookback_days(30)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    #[test]
    fn test_window_from_previous_watermark_starts_one_second_after() {
        let now = at(12);
        let previous_end = at(6);
        let decision = resolve_window(&definition(), Some(previous_end), None, None, now);
        assert_eq!(
            decision,
            WindowDecision::Window {
                start: previous_end + Duration::seconds(1),
                end: now
            }
        );
    }

    #[test]
    fn test_window_without_watermark_uses_lookback() {
        let now = at(12);
        let decision = resolve_window(&definition(), None, None, None, now);
        assert_eq!(
            decision,
            WindowDecision::Window {
                start: now - Duration::days(30),
                end: now
            }
        );
    }

    #[test]
    fn test_overrides_win_over_watermark() {
        let now = at(12);
        let decision = resolve_window(
            &definition(),
            Some(at(6)),
            Some(at(2)),
            Some(at(4)),
            now,
        );
        assert_eq!(
            decision,
            WindowDecision::Window {
                start: at(2),
                end: at(4)
            }
        );
    }

    #[test]
    fn test_short_window_is_skipped() {
        let definition = definition().with_min_time_span(Duration::hours(8));
        let now = at(12);
        // Watermark from 2 hours ago leaves a window below the 8h minimum.
        let decision = resolve_window(&definition, Some(at(10)), None, None, now);
        assert!(matches!(decision, WindowDecision::SkipTooShort { .. }));
    }

    #[test]
    fn test_long_window_is_clamped() {
        let definition = definition().with_max_time_span(Duration::hours(4));
        let now = at(12);
        let decision = resolve_window(&definition, Some(at(0)), None, None, now);
        assert_eq!(
            decision,
            WindowDecision::Window {
                start: at(0) + Duration::seconds(1),
                end: at(0) + Duration::seconds(1) + Duration::hours(4)
            }
        );
    }

    #[test]
    fn test_unwatermarked_endpoint_without_overrides_is_not_windowed() {
        let definition =
            EndpointDefinition::new("carriers", "carriers", 4, RequestBuilder::Simple);
        let decision = resolve_window(&definition, None, None, None, at(12));
        assert_eq!(decision, WindowDecision::NotWindowed);
    }

    #[test]
    fn test_overrides_window_an_unwatermarked_endpoint() {
        let definition =
            EndpointDefinition::new("carriers", "carriers", 4, RequestBuilder::Simple);
        let decision = resolve_window(&definition, None, Some(at(1)), Some(at(2)), at(12));
        assert_eq!(
            decision,
            WindowDecision::Window {
                start: at(1),
                end: at(2)
            }
        );
    }
}
