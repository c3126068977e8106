//! apipull CLI Library
//!
//! Command-line front end for the apipull ingestion engine:
//!
//! - **Endpoint discovery**: list vendors and their endpoint catalogs (`apipull list`)
//! - **Loading**: fetch one endpoint with automatic dependency resolution
//!   (`apipull load <vendor> <endpoint>`)
//!
//! Runtime settings come from `APIPULL_*` environment variables (see
//! [`config::Settings`]); per-invocation knobs come from command options.

pub mod commands;
pub mod config;
pub mod dates;
pub mod vendor;

pub use vendor::Vendor;

use apipull_core::model::SaveBehavior;
use clap::{Args, Parser, Subcommand};

/// apipull - resilient vendor API ingestion
#[derive(Parser, Debug)]
#[command(name = "apipull")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List vendors and their endpoints
    List {
        /// Limit the listing to one vendor
        vendor: Option<Vendor>,
    },

    /// Load one endpoint (dependency endpoints are fetched automatically)
    Load(LoadArgs),
}

/// Options for `apipull load`.
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Vendor that owns the endpoint
    pub vendor: Vendor,

    /// Endpoint name, as shown by `apipull list`
    pub endpoint: String,

    /// Window start (UTC). Accepts 2026-01-15, "2026-01-15 14:30",
    /// 2026-01-15T14:30:00Z, 01/15/2026, ...
    #[arg(long)]
    pub start: Option<String>,

    /// Window end (UTC); same formats as --start
    #[arg(long)]
    pub end: Option<String>,

    /// Rows per page (defaults to the endpoint's declared page size)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Safety cap on pages per pagination chain
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// When to persist pages: after-all, per-page, none
    #[arg(long, default_value = "after-all")]
    pub save_behavior: SaveBehavior,

    /// Do not advance the watermark even if the load fully succeeds
    #[arg(long)]
    pub no_watermark: bool,

    /// Raw JSON body for POST endpoints, merged with windowing parameters
    #[arg(long, default_value = "{}")]
    pub body_params: String,

    /// Store root for this run, overriding APIPULL_STORAGE_ROOT
    #[arg(long)]
    pub out_dir: Option<String>,

    /// Print the execution plan without fetching anything
    #[arg(long)]
    pub dry_run: bool,
}
