//! Configuration management.
//!
//! Values come from an optional file, then `WELLTRACK__*` environment
//! variables (for example `WELLTRACK__STORE__LOOKUP_TIMEOUT=500ms`). A
//! `.env` file in the working directory is loaded first.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{AuthzError, Result};
use crate::telemetry::LoggingConfig;

const ENV_PREFIX: &str = "WELLTRACK";

/// Authorization core configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which membership store backs the resolver.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store, for tests and local development
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// PostgreSQL connection URL, required for the postgres backend
    pub database_url: Option<String>,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Upper bound on one membership lookup; slower lookups deny
    #[serde(default = "default_lookup_timeout", with = "humantime_serde")]
    pub lookup_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
            lookup_timeout: default_lookup_timeout(),
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_lookup_timeout() -> Duration { Duration::from_secs(2) }

impl AuthzConfig {
    /// Load configuration from the environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: AuthzConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: AuthzConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Postgres && self.store.database_url.is_none() {
            return Err(AuthzError::configuration(
                "store.database_url is required for the postgres backend",
            ));
        }
        if self.store.lookup_timeout.is_zero() {
            return Err(AuthzError::configuration("store.lookup_timeout must be positive"));
        }
        if self.store.max_connections == 0 {
            return Err(AuthzError::configuration("store.max_connections must be positive"));
        }
        Ok(())
    }
}
