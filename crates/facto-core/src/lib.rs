//! Core library for facto invoice processing.
//!
//! This crate provides:
//! - PDF page reading with text positions (for layout-zone cropping)
//! - Belgian invoice field extraction (number, date, buyer block, lines, VAT totals)
//! - Remote entity resolution, idempotent invoice posting and Peppol delivery
//!   against any [`facto_ledger::LedgerBackend`]

pub mod error;
pub mod invoice;
pub mod models;
pub mod pdf;
pub mod posting;

pub use error::{FactoError, Result};
pub use invoice::{ExtractionResult, InvoiceExtractor, TemplateInvoiceParser};
pub use models::config::FactoConfig;
pub use models::invoice::{Buyer, LineItem, ParsedInvoice, TaxBucket, TaxTotals};
pub use pdf::{CropBox, PageSource, PdfDocument, PdfPage, PdfReader};
pub use posting::{DeliveryMachine, DeliveryOutcome, EntityResolver, InvoicePoster, PostStatus, PostedInvoice};

/// Re-export ledger types.
pub use facto_ledger::{LedgerBackend, LedgerError, MemoryBackend};
