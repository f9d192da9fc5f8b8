//! Remote entity resolution.

use std::sync::Arc;

use facto_ledger::{Domain, LedgerBackend, RecordId};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::record;
use crate::error::ResolutionError;
use crate::models::config::PostingConfig;
use crate::models::invoice::{Buyer, TaxBucket};

type Result<T> = std::result::Result<T, ResolutionError>;

/// Maps invoice labels onto ids in the ledger.
///
/// Every lookup is one exact-match search with limit 1. Nothing is cached,
/// so a record changed remotely is picked up on the next invoice.
#[derive(Clone)]
pub struct EntityResolver {
    backend: Arc<dyn LedgerBackend>,
    config: PostingConfig,
}

impl EntityResolver {
    /// Create a resolver.
    pub fn new(backend: Arc<dyn LedgerBackend>, config: PostingConfig) -> Self {
        Self { backend, config }
    }

    /// Reference data settings in use.
    pub fn config(&self) -> &PostingConfig {
        &self.config
    }

    async fn find_one(&self, entity: &'static str, model: &str, domain: Domain, key: String) -> Result<RecordId> {
        let ids = self.backend.search(model, &domain, Some(1)).await?;
        match ids.first() {
            Some(&id) => {
                debug!("Resolved {} '{}' to {}", entity, key, id);
                Ok(id)
            }
            None => Err(ResolutionError::NotFound { entity, key }),
        }
    }

    /// Sales account by code.
    pub async fn sales_account(&self) -> Result<RecordId> {
        let code = &self.config.sales_account_code;
        self.find_one("account", "account.account", Domain::new().field_eq("code", code.as_str()), code.clone())
            .await
    }

    /// Active sale tax for a bucket.
    pub async fn tax(&self, bucket: TaxBucket) -> Result<RecordId> {
        let domain = Domain::new()
            .field_eq("type_tax_use", "sale")
            .field_eq("amount", bucket.rate())
            .field_eq("active", true);
        self.find_one("tax", "account.tax", domain, bucket.display()).await
    }

    /// Sales journal by code.
    pub async fn journal(&self) -> Result<RecordId> {
        let code = &self.config.journal_code;
        self.find_one("journal", "account.journal", Domain::new().field_eq("code", code.as_str()), code.clone())
            .await
    }

    /// Home country by ISO code.
    pub async fn country(&self) -> Result<RecordId> {
        let code = &self.config.country_code;
        self.find_one("country", "res.country", Domain::new().field_eq("code", code.as_str()), code.clone())
            .await
    }

    /// Find the buyer by VAT number, creating it on first sighting.
    pub async fn partner(&self, buyer: &Buyer) -> Result<RecordId> {
        let vat = buyer
            .vat_number
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ResolutionError::MissingVat)?;

        let existing = self
            .backend
            .search("res.partner", &Domain::new().field_eq("vat", vat), Some(1))
            .await?;
        if let Some(&id) = existing.first() {
            debug!("Partner {} exists as {}", vat, id);
            return Ok(id);
        }

        let country_id = self.country().await?;
        let values = record(json!({
            "name": buyer.name,
            "street": buyer.street,
            "city": buyer.city,
            "zip": buyer.postal_code,
            "phone": buyer.phone.as_deref().map_or(Value::Bool(false), |p| json!(p)),
            "country_id": country_id,
            "vat": vat,
            "lang": self.config.partner_lang,
            "is_company": true,
            "invoice_sending_method": self.config.sending_method,
            "invoice_edi_format": self.config.edi_format,
        }));

        let id = self.backend.create("res.partner", values).await?;
        info!(partner = id, vat, "Created partner {}", buyer.name);
        Ok(id)
    }
}
