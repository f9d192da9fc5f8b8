//! Idempotent invoice posting.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use facto_ledger::{Domain, LedgerBackend, Record, RecordId};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{record, EntityResolver};
use crate::error::{PostingError, PostingStage};
use crate::models::invoice::ParsedInvoice;

type Result<T> = std::result::Result<T, PostingError>;

/// Whether the invoice was created by this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Created, attached and posted now.
    Created,
    /// An invoice with the same reference already existed; nothing was written.
    Duplicate,
}

/// Outcome of posting one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedInvoice {
    /// Remote invoice id.
    pub move_id: RecordId,
    /// Name the source document is archived under.
    pub filename: String,
    pub status: PostStatus,
}

impl PostedInvoice {
    /// One-line description for logs.
    pub fn message(&self) -> String {
        match self.status {
            PostStatus::Created => format!("Invoice {} created and posted", self.move_id),
            PostStatus::Duplicate => format!("Invoice {} already exists", self.move_id),
        }
    }
}

/// Creates, attaches and posts invoices.
///
/// The duplicate check is a lookup before create, so two posters racing on
/// the same number can both create.
#[derive(Clone)]
pub struct InvoicePoster {
    backend: Arc<dyn LedgerBackend>,
    resolver: EntityResolver,
}

impl InvoicePoster {
    /// Create a poster sharing the resolver's backend.
    pub fn new(backend: Arc<dyn LedgerBackend>, resolver: EntityResolver) -> Self {
        Self { backend, resolver }
    }

    /// Post the invoice parsed from `document`.
    pub async fn post(&self, document: &Path, invoice: &ParsedInvoice) -> Result<PostedInvoice> {
        let number = invoice.invoice_number.trim();
        if number.is_empty() {
            return Err(PostingError::MissingField("invoice number"));
        }
        // Refuse before touching the ledger when there is nothing to bill
        if invoice.tax_totals.non_zero_buckets().is_empty() {
            return Err(PostingError::NoInvoiceLines);
        }

        // The source must be readable before a draft exists for it
        let data = tokio::fs::read(document).await?;
        let filename = invoice.archive_filename();
        let config = self.resolver.config();

        let partner_id = self.resolver.partner(&invoice.buyer).await?;
        let journal_id = self.resolver.journal().await?;
        let lines = self.invoice_lines(invoice).await?;

        // Duplicate check
        let domain = Domain::new()
            .field_eq("move_type", config.move_type.as_str())
            .field_eq("ref", number);
        let existing = self
            .backend
            .search("account.move", &domain, Some(1))
            .await
            .map_err(|source| PostingError::Remote {
                stage: PostingStage::DuplicateCheck,
                source,
            })?;
        if let Some(&move_id) = existing.first() {
            info!(invoice = number, move_id, "Invoice already exists");
            return Ok(PostedInvoice {
                move_id,
                filename,
                status: PostStatus::Duplicate,
            });
        }

        // Create the draft
        let values = record(json!({
            "move_type": config.move_type,
            "journal_id": journal_id,
            "partner_id": partner_id,
            "invoice_date": invoice.invoice_date.format("%Y-%m-%d").to_string(),
            "ref": number,
            "invoice_line_ids": lines,
        }));
        let move_id = self
            .backend
            .create("account.move", values)
            .await
            .map_err(|source| PostingError::Remote {
                stage: PostingStage::Create,
                source,
            })?;
        debug!(invoice = number, move_id, "Draft invoice created");

        // Attach the source document
        let attachment = record(json!({
            "name": filename,
            "type": "binary",
            "datas": base64::engine::general_purpose::STANDARD.encode(&data),
            "res_model": "account.move",
            "res_id": move_id,
            "mimetype": "application/pdf",
        }));
        self.backend
            .create("ir.attachment", attachment)
            .await
            .map_err(|source| PostingError::Remote {
                stage: PostingStage::Attach,
                source,
            })?;

        // Post
        self.backend
            .action("account.move", "action_post", &[move_id], Record::new())
            .await
            .map_err(|source| PostingError::Remote {
                stage: PostingStage::Post,
                source,
            })?;

        info!(invoice = number, move_id, "Invoice posted");
        Ok(PostedInvoice {
            move_id,
            filename,
            status: PostStatus::Created,
        })
    }

    /// One create command per non-zero tax bucket.
    async fn invoice_lines(&self, invoice: &ParsedInvoice) -> Result<Vec<Value>> {
        let buckets = invoice.tax_totals.non_zero_buckets();
        if buckets.is_empty() {
            return Err(PostingError::NoInvoiceLines);
        }

        let account_id = self.resolver.sales_account().await?;
        let config = self.resolver.config();

        let mut lines = Vec::with_capacity(buckets.len());
        for (bucket, amount) in buckets {
            let tax_id = self.resolver.tax(bucket).await?;
            lines.push(json!([0, 0, {
                "name": config.label(bucket),
                "quantity": 1,
                "price_unit": amount.to_f64().unwrap_or_default(),
                "account_id": account_id,
                "tax_ids": [[6, 0, [tax_id]]],
            }]));
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::models::config::PostingConfig;
    use crate::models::invoice::{Buyer, TaxTotals};
    use chrono::NaiveDate;
    use facto_ledger::MemoryBackend;
    use rust_decimal::Decimal;
    use std::io::Write;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    fn invoice(totals: TaxTotals) -> ParsedInvoice {
        ParsedInvoice {
            invoice_number: "7216".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 12, 19).unwrap(),
            buyer: Buyer {
                name: "Acme Food BV".to_string(),
                street: "Kerkstraat 1".to_string(),
                postal_code: "9200".to_string(),
                city: "Dendermonde".to_string(),
                phone: None,
                vat_number: Some("BE0123456789".to_string()),
            },
            line_items: Vec::new(),
            tax_totals: totals,
        }
    }

    fn six_percent() -> TaxTotals {
        TaxTotals {
            rate_6_total: Decimal::from_str("15.00").unwrap(),
            ..TaxTotals::default()
        }
    }

    fn setup() -> (Arc<MemoryBackend>, InvoicePoster, NamedTempFile) {
        let backend = Arc::new(MemoryBackend::with_reference_data());
        let resolver = EntityResolver::new(backend.clone(), PostingConfig::default());
        let poster = InvoicePoster::new(backend.clone(), resolver);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.5 test").unwrap();
        (backend, poster, file)
    }

    #[tokio::test]
    async fn test_post_creates_attaches_and_posts() {
        let (backend, poster, file) = setup();

        let posted = poster.post(file.path(), &invoice(six_percent())).await.unwrap();
        assert_eq!(posted.status, PostStatus::Created);
        assert_eq!(posted.filename, "AcmeFoodBV_20251219_7216.pdf");

        let moves = backend.records("account.move");
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0]["ref"], "7216");
        assert_eq!(moves[0]["invoice_date"], "2025-12-19");
        assert_eq!(moves[0]["state"], "posted");

        let attachments = backend.records("ir.attachment");
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0]["res_id"], posted.move_id);
        assert_eq!(attachments[0]["datas"], "JVBERi0xLjUgdGVzdA==");
    }

    #[tokio::test]
    async fn test_one_line_for_single_bucket() {
        let (backend, poster, file) = setup();
        poster.post(file.path(), &invoice(six_percent())).await.unwrap();

        let moves = backend.records("account.move");
        let lines = moves[0]["invoice_line_ids"].as_array().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0][2]["name"], "Voeding en levensmiddelen");
        assert_eq!(lines[0][2]["price_unit"], 15.0);
        assert_eq!(lines[0][2]["quantity"], 1);

        // The line's tax is the 6% sale tax
        let tax_id = lines[0][2]["tax_ids"][0][2][0].as_i64().unwrap();
        let tax = backend
            .records("account.tax")
            .into_iter()
            .find(|t| t["id"] == tax_id)
            .unwrap();
        assert_eq!(tax["amount"], 6.0);
    }

    #[tokio::test]
    async fn test_second_post_is_duplicate() {
        let (backend, poster, file) = setup();

        let first = poster.post(file.path(), &invoice(six_percent())).await.unwrap();
        let second = poster.post(file.path(), &invoice(six_percent())).await.unwrap();

        assert_eq!(second.status, PostStatus::Duplicate);
        assert_eq!(second.move_id, first.move_id);
        assert!(second.message().contains("already exists"));
        assert_eq!(backend.records("account.move").len(), 1);
        assert_eq!(backend.records("ir.attachment").len(), 1);
        assert_eq!(backend.count_calls("action_post"), 1);
    }

    #[tokio::test]
    async fn test_all_zero_fails_before_any_remote_call() {
        let (backend, poster, file) = setup();

        let err = poster.post(file.path(), &invoice(TaxTotals::default())).await.unwrap_err();
        assert!(matches!(err, PostingError::NoInvoiceLines));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_vat_is_a_resolution_error() {
        let (backend, poster, file) = setup();
        let mut invoice = invoice(six_percent());
        invoice.buyer.vat_number = None;

        let err = poster.post(file.path(), &invoice).await.unwrap_err();
        assert!(matches!(err, PostingError::Resolution(ResolutionError::MissingVat)));
        assert_eq!(backend.count_calls("create"), 0);
    }

    #[tokio::test]
    async fn test_post_failure_reports_stage() {
        let (backend, poster, file) = setup();
        backend.fail_next("account.move", "action_post", "validation error");

        let err = poster.post(file.path(), &invoice(six_percent())).await.unwrap_err();
        assert!(matches!(err, PostingError::Remote { stage: PostingStage::Post, .. }));
        assert!(err.to_string().contains("validation error"));
    }

    #[tokio::test]
    async fn test_unreadable_source_creates_nothing() {
        let (backend, poster, file) = setup();
        let missing = file.path().with_extension("gone.pdf");

        let err = poster.post(&missing, &invoice(six_percent())).await.unwrap_err();
        assert!(matches!(err, PostingError::Io(_)));
        assert!(backend.records("account.move").is_empty());
        assert!(backend.calls().is_empty());

        // A later attempt with the file present posts normally
        let posted = poster.post(file.path(), &invoice(six_percent())).await.unwrap();
        assert_eq!(posted.status, PostStatus::Created);
    }
}
