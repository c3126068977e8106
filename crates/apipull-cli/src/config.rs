//! CLI runtime settings
//!
//! Everything is environment-driven so the same binary works in a
//! scheduler, a container, or a developer shell. A `.env` file is honored
//! when present (loaded in `main`).

use std::time::Duration;

use apipull_core::engine::FetchEngineConfig;

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_STORAGE_ROOT: &str = "./apipull-data";
pub const DEFAULT_MAX_PARALLELISM: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Runtime settings, resolved from `APIPULL_*` environment variables with
/// documented defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Environment segment of the storage path (dev, tst, prd, ...).
    pub environment: String,

    /// Root directory of the local ingestion store.
    pub storage_root: String,

    pub max_parallelism: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,

    /// TruckerCloud credentials; required only when loading that vendor.
    pub truckercloud_username: Option<String>,
    pub truckercloud_password: Option<String>,

    /// Base URL overrides, mainly for pointing at test servers.
    pub truckercloud_base_url: Option<String>,
    pub fmcsa_base_url: Option<String>,
}

impl Settings {
    /// Load settings from the environment. Unset or unparseable values
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            environment: env_string("APIPULL_ENVIRONMENT", DEFAULT_ENVIRONMENT),
            storage_root: env_string("APIPULL_STORAGE_ROOT", DEFAULT_STORAGE_ROOT),
            max_parallelism: env_parsed("APIPULL_MAX_PARALLELISM", DEFAULT_MAX_PARALLELISM),
            max_retries: env_parsed("APIPULL_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_delay_ms: env_parsed("APIPULL_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
            request_timeout_secs: env_parsed(
                "APIPULL_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            truckercloud_username: env_optional("APIPULL_TC_USERNAME"),
            truckercloud_password: env_optional("APIPULL_TC_PASSWORD"),
            truckercloud_base_url: env_optional("APIPULL_TC_BASE_URL"),
            fmcsa_base_url: env_optional("APIPULL_FMCSA_BASE_URL"),
        }
    }

    pub fn engine_config(&self) -> FetchEngineConfig {
        FetchEngineConfig {
            max_parallelism: self.max_parallelism,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            storage_root: DEFAULT_STORAGE_ROOT.to_string(),
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            truckercloud_username: None,
            truckercloud_password: None,
            truckercloud_base_url: None,
            fmcsa_base_url: None,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
