//! Invoice field extraction module.

mod parser;
pub mod rules;

pub use parser::{ExtractionResult, TemplateInvoiceParser};

use crate::error::ExtractionError;
use crate::pdf::{PageSource, PdfDocument};

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Trait for invoice field extractors.
///
/// Implementations work on page sources so a different layout strategy can
/// be plugged in without touching the pipeline.
pub trait InvoiceExtractor: Send + Sync {
    /// Extract invoice data from the pages of one document.
    fn extract(&self, pages: &[&dyn PageSource]) -> Result<ExtractionResult>;

    /// Extract invoice data from a loaded PDF.
    fn extract_document(&self, document: &PdfDocument) -> Result<ExtractionResult> {
        let pages: Vec<&dyn PageSource> = document.pages().iter().map(|p| p as &dyn PageSource).collect();
        self.extract(&pages)
    }
}
