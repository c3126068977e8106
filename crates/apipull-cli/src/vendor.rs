//! Vendor selection and wiring
//!
//! Maps the CLI vendor argument onto the concrete adapter and endpoint
//! catalog from `apipull-vendors`.

use std::sync::Arc;

use anyhow::Context;
use apipull_core::adapter::VendorAdapter;
use apipull_core::model::EndpointEntry;
use apipull_vendors::{fmcsa, truckercloud};

use crate::config::Settings;

/// Vendors the CLI can load from.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    #[value(name = "truckercloud")]
    TruckerCloud,
    #[value(name = "fmcsa")]
    Fmcsa,
}

impl Vendor {
    pub fn all() -> &'static [Vendor] {
        &[Vendor::TruckerCloud, Vendor::Fmcsa]
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Vendor::TruckerCloud => "TruckerCloud",
            Vendor::Fmcsa => "FMCSA",
        }
    }

    pub fn catalog(self) -> Vec<EndpointEntry> {
        match self {
            Vendor::TruckerCloud => truckercloud::endpoints::catalog(),
            Vendor::Fmcsa => fmcsa::endpoints::catalog(),
        }
    }

    /// Build the adapter for this vendor from runtime settings.
    pub fn build_adapter(self, settings: &Settings) -> anyhow::Result<Arc<dyn VendorAdapter>> {
        match self {
            Vendor::TruckerCloud => {
                let username = settings
                    .truckercloud_username
                    .clone()
                    .context("APIPULL_TC_USERNAME is not set")?;
                let password = settings
                    .truckercloud_password
                    .clone()
                    .context("APIPULL_TC_PASSWORD is not set")?;
                let adapter = match &settings.truckercloud_base_url {
                    Some(base_url) => truckercloud::TruckerCloudAdapter::with_base_url(
                        base_url.clone(),
                        username,
                        password,
                    )?,
                    None => truckercloud::TruckerCloudAdapter::new(username, password)?,
                };
                Ok(Arc::new(adapter))
            }
            Vendor::Fmcsa => {
                let adapter = match &settings.fmcsa_base_url {
                    Some(base_url) => fmcsa::FmcsaAdapter::with_base_url(base_url.clone()),
                    None => fmcsa::FmcsaAdapter::new(),
                };
                Ok(Arc::new(adapter))
            }
        }
    }
}
