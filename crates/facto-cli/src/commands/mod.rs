//! CLI commands.

pub mod check;
pub mod config;
pub mod extract;
pub mod process;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use facto_core::FactoConfig;
use facto_ledger::{Json2Backend, LedgerBackend, MemoryBackend};
use tracing::{debug, info};

/// Location of the configuration file when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facto")
        .join("config.json")
}

/// Settings shared by the commands that run the pipeline.
pub struct Context {
    pub config: FactoConfig,
    pub config_path: PathBuf,
    pub dry_run: bool,
}

impl Context {
    /// Load the config file (defaults when absent) and apply `ODOO_*` overrides.
    pub fn load(config_path: PathBuf, dry_run: bool) -> anyhow::Result<Self> {
        let mut config = if config_path.exists() {
            debug!("Loading configuration from {}", config_path.display());
            FactoConfig::from_file(&config_path)?
        } else {
            debug!("No configuration at {}, using defaults", config_path.display());
            FactoConfig::default()
        };
        config.apply_env();

        Ok(Self {
            config,
            config_path,
            dry_run,
        })
    }

    /// Connect to the live ledger, or the seeded in-memory one for dry runs.
    pub fn backend(&self) -> anyhow::Result<Arc<dyn LedgerBackend>> {
        self.config.validate(!self.dry_run)?;

        if self.dry_run {
            info!("Dry run: using the in-memory ledger");
            return Ok(Arc::new(MemoryBackend::with_reference_data()));
        }
        Ok(Arc::new(self.json2_backend()?))
    }

    /// The Odoo JSON-2 client built from the `ledger` section.
    pub fn json2_backend(&self) -> anyhow::Result<Json2Backend> {
        let ledger = &self.config.ledger;
        let backend = Json2Backend::new(
            &ledger.url,
            &ledger.database,
            &ledger.api_key,
            Duration::from_secs(ledger.timeout_secs),
        )?;
        info!("Using Odoo at {} (database {})", ledger.url, ledger.database);
        Ok(backend)
    }
}
