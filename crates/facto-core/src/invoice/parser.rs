//! Layout-driven parser for the Belgian sales-invoice template.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::invoice::ParsedInvoice;
use crate::pdf::{CropBox, PageSource};

use super::rules::{
    buyer::extract_buyer, dates::extract_invoice_date, extract_line_items, extract_tax_totals,
    patterns::INVOICE_NUMBER, vat::validate_be_vat,
};
use super::{InvoiceExtractor, Result};

/// Result of invoice extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Extracted invoice data.
    pub invoice: ParsedInvoice,
    /// Inconsistencies that did not stop extraction.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Template parser.
///
/// Number and date come from the first page, the buyer from a crop of the
/// first page's top-right zone, items from every page, totals from the
/// concatenated text.
#[derive(Debug, Clone)]
pub struct TemplateInvoiceParser {
    /// Left edge of the buyer zone as a fraction of page width.
    buyer_zone_left: f64,
    /// Bottom of the buyer zone as a fraction of page height.
    buyer_zone_bottom: f64,
    /// Warn on a bad Belgian VAT checksum.
    validate_vat: bool,
}

impl TemplateInvoiceParser {
    /// Create a parser with the template's default zones.
    pub fn new() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }

    /// Create a parser from configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            buyer_zone_left: config.buyer_zone_left,
            buyer_zone_bottom: config.buyer_zone_bottom,
            validate_vat: config.validate_vat,
        }
    }

    /// Set the buyer zone fractions.
    pub fn with_buyer_zone(mut self, left: f64, bottom: f64) -> Self {
        self.buyer_zone_left = left;
        self.buyer_zone_bottom = bottom;
        self
    }

    /// Set VAT checksum validation.
    pub fn with_vat_validation(mut self, validate: bool) -> Self {
        self.validate_vat = validate;
        self
    }

    /// Region of a page holding the buyer block.
    pub fn buyer_zone(&self, page: &dyn PageSource) -> CropBox {
        CropBox::new(
            page.width() * self.buyer_zone_left,
            0.0,
            page.width(),
            page.height() * self.buyer_zone_bottom,
        )
    }

    fn extract_invoice_number(&self, text: &str) -> Option<String> {
        INVOICE_NUMBER.captures(text).map(|caps| caps[1].trim().to_string())
    }
}

impl Default for TemplateInvoiceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceExtractor for TemplateInvoiceParser {
    fn extract(&self, pages: &[&dyn PageSource]) -> Result<ExtractionResult> {
        let start = Instant::now();

        let texts: Vec<String> = pages.iter().map(|p| p.text()).collect();
        if texts.iter().all(|t| t.trim().is_empty()) {
            return Err(ExtractionError::NoText);
        }

        // Header fields live on the first page with text
        let Some(first) = texts.iter().position(|t| !t.trim().is_empty()) else {
            return Err(ExtractionError::NoText);
        };
        let first_text = &texts[first];
        info!("Parsing invoice from {} pages ({} characters on the first)", pages.len(), first_text.len());

        let invoice_number = self
            .extract_invoice_number(first_text)
            .ok_or(ExtractionError::MissingField("invoice_number"))?;

        let invoice_date = extract_invoice_date(first_text)
            .map(|m| m.value)
            .ok_or(ExtractionError::MissingField("invoice_date"))?;

        // Buyer block
        let zone = self.buyer_zone(pages[first]);
        let buyer_text = pages[first].crop(zone).text();
        debug!("Buyer zone {:?}: {:?}", zone, buyer_text);
        let buyer = extract_buyer(&buyer_text);
        let empty_zone = buyer_text.trim().is_empty();

        // Items on every page
        let line_items = texts.iter().flat_map(|t| extract_line_items(t)).collect();

        // Totals from the whole document
        let tax_totals = extract_tax_totals(&texts.join("\n"));

        let invoice = ParsedInvoice {
            invoice_number,
            invoice_date,
            buyer,
            line_items,
            tax_totals,
        };

        let mut warnings = invoice.validate();
        if empty_zone {
            warnings.push("Buyer zone has no positioned text".to_string());
        }
        if self.validate_vat {
            if let Some(vat) = invoice.buyer.vat_number.as_deref() {
                if vat.starts_with("BE") && !validate_be_vat(vat) {
                    warnings.push(format!("VAT number {} fails the Belgian checksum", vat));
                }
            }
        }
        for warning in &warnings {
            debug!("Invoice {}: {}", invoice.invoice_number, warning);
        }

        Ok(ExtractionResult {
            invoice,
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
