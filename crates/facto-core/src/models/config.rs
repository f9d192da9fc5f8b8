//! Configuration structures for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::FactoError;
use crate::models::invoice::TaxBucket;

/// Main configuration for facto.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoConfig {
    /// Folder watching and routing.
    pub watch: WatchConfig,

    /// Invoice extraction configuration.
    pub extraction: ExtractionConfig,

    /// Accounting system connection.
    pub ledger: LedgerConfig,

    /// Reference data used when posting.
    pub posting: PostingConfig,
}

/// Which filesystem watcher implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherBackend {
    /// Poll the directory; works on network shares.
    Poll,
    /// OS change notifications.
    Native,
}

/// Folder watching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory receiving new invoice PDFs.
    pub input_dir: PathBuf,

    /// Destination for posted and delivered invoices.
    pub sent_dir: PathBuf,

    /// Destination for posted invoices still waiting on delivery.
    pub posted_dir: PathBuf,

    /// Destination for files that failed any stage.
    pub error_dir: PathBuf,

    /// Pending-queue poll period in milliseconds.
    pub poll_interval_ms: u64,

    /// Full directory re-scan period in seconds.
    pub rescan_interval_secs: u64,

    /// Delay between reconnect attempts when the input is unreachable.
    pub reconnect_interval_secs: u64,

    /// Give up on a file that is still being written after this long.
    pub readiness_timeout_secs: u64,

    /// Initial readiness retry delay in milliseconds.
    pub readiness_retry_ms: u64,

    /// Number of files processed concurrently (1 = one in flight).
    pub max_workers: usize,

    /// Watcher implementation.
    pub watcher: WatcherBackend,
}

impl Default for WatchConfig {
    fn default() -> Self {
        let root = PathBuf::from("invoices");
        Self {
            input_dir: root.join("inbox"),
            sent_dir: root.join("sent"),
            posted_dir: root.join("posted"),
            error_dir: root.join("error"),
            poll_interval_ms: 500,
            rescan_interval_secs: 15 * 60,
            reconnect_interval_secs: 10,
            readiness_timeout_secs: 10,
            readiness_retry_ms: 1000,
            max_workers: 1,
            watcher: WatcherBackend::Poll,
        }
    }
}

/// Invoice extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Left edge of the buyer zone as a fraction of page width.
    pub buyer_zone_left: f64,

    /// Bottom edge of the buyer zone as a fraction of page height, from the top.
    pub buyer_zone_bottom: f64,

    /// Check the Belgian VAT mod-97 checksum.
    pub validate_vat: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            buyer_zone_left: 0.45,
            buyer_zone_bottom: 0.40,
            validate_vat: true,
        }
    }
}

/// Connection settings for the accounting system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Base URL, e.g. `https://example.odoo.com`.
    pub url: String,

    /// Database name.
    pub database: String,

    /// API key. Usually supplied via `ODOO_API_KEY` rather than stored.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            database: String::new(),
            api_key: String::new(),
            timeout_secs: 15,
        }
    }
}

/// Reference data and labels used to build invoices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    pub move_type: String,
    pub journal_code: String,
    pub sales_account_code: String,
    pub country_code: String,
    pub partner_lang: String,
    pub sending_method: String,
    pub edi_format: String,

    /// Line label for the 0% bucket.
    pub label_exempt: String,

    /// Line label for the 6% bucket.
    pub label_reduced: String,

    /// Line label for the 21% bucket.
    pub label_standard: String,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            move_type: "out_invoice".to_string(),
            journal_code: "VF".to_string(),
            sales_account_code: "700000".to_string(),
            country_code: "BE".to_string(),
            partner_lang: "nl_BE".to_string(),
            sending_method: "peppol".to_string(),
            edi_format: "ubl_bis3".to_string(),
            label_exempt: TaxBucket::Exempt.label().to_string(),
            label_reduced: TaxBucket::Reduced6.label().to_string(),
            label_standard: TaxBucket::Standard21.label().to_string(),
        }
    }
}

impl PostingConfig {
    /// Line label for a tax bucket.
    pub fn label(&self, bucket: TaxBucket) -> &str {
        match bucket {
            TaxBucket::Exempt => &self.label_exempt,
            TaxBucket::Reduced6 => &self.label_reduced,
            TaxBucket::Standard21 => &self.label_standard,
        }
    }
}

impl FactoConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Override connection settings from `ODOO_URL`, `ODOO_DB` and `ODOO_API_KEY`.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Override connection settings from an arbitrary variable source.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 3] = [
            ("ODOO_URL", &mut self.ledger.url),
            ("ODOO_DB", &mut self.ledger.database),
            ("ODOO_API_KEY", &mut self.ledger.api_key),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value.trim().to_string();
            }
        }
    }

    /// Check the configuration. `live` also requires connection settings.
    pub fn validate(&self, live: bool) -> Result<(), FactoError> {
        if live {
            if self.ledger.url.trim().is_empty() {
                return Err(FactoError::Config("ledger.url is not set (or ODOO_URL)".to_string()));
            }
            if self.ledger.database.trim().is_empty() {
                return Err(FactoError::Config("ledger.database is not set (or ODOO_DB)".to_string()));
            }
            if self.ledger.api_key.trim().is_empty() {
                return Err(FactoError::Config("ledger.api_key is not set (or ODOO_API_KEY)".to_string()));
            }
        }

        if self.watch.max_workers == 0 {
            return Err(FactoError::Config("watch.max_workers must be at least 1".to_string()));
        }

        for (name, value) in [
            ("extraction.buyer_zone_left", self.extraction.buyer_zone_left),
            ("extraction.buyer_zone_bottom", self.extraction.buyer_zone_bottom),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(FactoError::Config(format!("{} must be in (0, 1], got {}", name, value)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = FactoConfig::default();
        assert_eq!(config.watch.poll_interval_ms, 500);
        assert_eq!(config.watch.rescan_interval_secs, 900);
        assert_eq!(config.watch.max_workers, 1);
        assert_eq!(config.watch.watcher, WatcherBackend::Poll);
        assert_eq!(config.posting.journal_code, "VF");
        assert_eq!(config.posting.label(TaxBucket::Reduced6), "Voeding en levensmiddelen");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: FactoConfig =
            serde_json::from_str(r#"{"watch": {"max_workers": 4, "watcher": "native"}}"#).unwrap();
        assert_eq!(config.watch.max_workers, 4);
        assert_eq!(config.watch.watcher, WatcherBackend::Native);
        assert_eq!(config.watch.readiness_timeout_secs, 10);
        assert_eq!(config.posting.sales_account_code, "700000");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = FactoConfig::default();
        config.ledger.url = "https://example.odoo.com".to_string();
        config.save(&path).unwrap();

        let loaded = FactoConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ledger.url, "https://example.odoo.com");
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<&str, &str> =
            [("ODOO_URL", "https://erp.example.be "), ("ODOO_DB", "prod"), ("ODOO_API_KEY", "")].into();

        let mut config = FactoConfig::default();
        config.ledger.api_key = "from-file".to_string();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.ledger.url, "https://erp.example.be");
        assert_eq!(config.ledger.database, "prod");
        assert_eq!(config.ledger.api_key, "from-file");
    }

    #[test]
    fn test_validate() {
        let mut config = FactoConfig::default();
        assert!(config.validate(false).is_ok());
        assert!(config.validate(true).is_err());

        config.ledger.url = "https://erp".to_string();
        config.ledger.database = "db".to_string();
        config.ledger.api_key = "key".to_string();
        assert!(config.validate(true).is_ok());

        config.watch.max_workers = 0;
        assert!(config.validate(true).is_err());

        config.watch.max_workers = 2;
        config.extraction.buyer_zone_left = 1.5;
        assert!(config.validate(false).is_err());
    }
}
