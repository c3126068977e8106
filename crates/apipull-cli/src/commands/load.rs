//! `apipull load` - load one endpoint with automatic dependency resolution.
//!
//! Dependency endpoints are fetched first with persistence and watermark
//! updates disabled; only the target endpoint is saved with the caller's
//! options. Ctrl-C cancels the in-flight run cooperatively.

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use apipull_core::engine::FetchEngine;
use apipull_core::events::LoggingEventPublisher;
use apipull_core::loader::{EndpointLoader, LoadOptions};
use apipull_core::model::{EndpointEntry, FetchResult, SaveBehavior, SystemRunIdSource};
use apipull_core::resolver::resolve_chain;
use apipull_core::store::LocalFileIngestionStore;

use crate::config::Settings;
use crate::{dates, LoadArgs};

pub async fn run(args: &LoadArgs, settings: &Settings) -> anyhow::Result<()> {
    let catalog = args.vendor.catalog();
    let chain = resolve_chain(&catalog, &args.endpoint)?;

    let start_utc = parse_bound(args.start.as_deref()).context("invalid --start")?;
    let end_utc = parse_bound(args.end.as_deref()).context("invalid --end")?;

    if args.dry_run {
        print_plan(args, &chain, start_utc, end_utc);
        return Ok(());
    }

    let adapter = args.vendor.build_adapter(settings)?;
    let engine = FetchEngine::new(adapter, settings.engine_config())?;
    let storage_root = args.out_dir.as_ref().unwrap_or(&settings.storage_root);
    let store = Arc::new(LocalFileIngestionStore::new(storage_root)?);
    let loader = EndpointLoader::new(
        engine,
        store,
        Arc::new(LoggingEventPublisher),
        Arc::new(SystemRunIdSource),
        &settings.environment,
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling the run");
            interrupt.cancel();
        }
    });

    // Walk the chain deepest-first, feeding each step's results into the
    // next step's iteration list. Only the final step is the target.
    let mut iteration_list: Option<Vec<FetchResult>> = None;
    let last = chain.len() - 1;
    for (step, entry) in chain.iter().enumerate() {
        if step < last {
            info!(
                endpoint = %entry.name,
                "fetching dependency (not persisted, feeds the iteration list)"
            );
            let results = loader
                .load(
                    &entry.definition,
                    LoadOptions {
                        iteration_list: iteration_list.as_deref(),
                        save_behavior: SaveBehavior::None,
                        save_watermark: false,
                        ..LoadOptions::default()
                    },
                    &cancel,
                )
                .await
                .with_context(|| format!("dependency '{}' failed", entry.name))?;
            if results.is_empty() {
                warn!(
                    endpoint = %entry.name,
                    "dependency returned no results; the target may produce empty output"
                );
            }
            iteration_list = Some(results);
        } else {
            info!(endpoint = %entry.name, "loading target endpoint");
            let results = loader
                .load(
                    &entry.definition,
                    LoadOptions {
                        iteration_list: iteration_list.as_deref(),
                        override_start_utc: start_utc,
                        override_end_utc: end_utc,
                        page_size: args.page_size,
                        max_pages: args.max_pages,
                        save_behavior: args.save_behavior,
                        save_watermark: !args.no_watermark,
                        body_params_json: args.body_params.clone(),
                    },
                    &cancel,
                )
                .await?;

            let nr_failed = results.iter().filter(|r| !r.fetch_succeeded()).count();
            println!(
                "{}: {} pages fetched, {} failed",
                entry.name,
                results.len(),
                nr_failed
            );
            if nr_failed > 0 {
                bail!("{nr_failed} of {} pages failed to fetch", results.len());
            }
        }
    }
    Ok(())
}

fn parse_bound(input: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    input.map(dates::parse_flexible).transpose()
}

fn print_plan(
    args: &LoadArgs,
    chain: &[&EndpointEntry],
    start_utc: Option<DateTime<Utc>>,
    end_utc: Option<DateTime<Utc>>,
) {
    let target = chain[chain.len() - 1];
    println!();
    println!("=== DRY RUN ===");
    println!(
        "Endpoint:      {} (v{})",
        target.name, target.definition.resource_version
    );
    println!("Resource:      {}", target.definition.resource_name);
    println!("Save behavior: {}", args.save_behavior);
    println!(
        "Watermark:     {}",
        if args.no_watermark { "skip" } else { "save" }
    );
    if let Some(start) = start_utc {
        println!("Start:         {}", start.to_rfc3339());
    }
    if let Some(end) = end_utc {
        println!("End:           {}", end.to_rfc3339());
    }
    if let Some(page_size) = args.page_size {
        println!("Page size:     {page_size}");
    }
    if let Some(max_pages) = args.max_pages {
        println!("Max pages:     {max_pages}");
    }
    if chain.len() > 1 {
        println!();
        println!("Dependency chain (executed in order):");
        for (i, entry) in chain.iter().enumerate() {
            let marker = if i == chain.len() - 1 {
                "  <-- target (saved)"
            } else {
                "  (fetched, not saved)"
            };
            println!(
                "  {}. {} v{}{marker}",
                i + 1,
                entry.name,
                entry.definition.resource_version
            );
        }
    }
    println!();
    println!("No data will be fetched.");
}
