//! Error types for the facto-core library.

use thiserror::Error;

/// Main error type for the facto library.
#[derive(Error, Debug)]
pub enum FactoError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Invoice extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Reference data could not be resolved in the ledger.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Invoice could not be created, attached or posted.
    #[error("posting error: {0}")]
    Posting(#[from] PostingError),

    /// Invoice could not be delivered.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Error from the ledger layer.
    #[error("ledger error: {0}")]
    Ledger(#[from] facto_ledger::LedgerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to invoice field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No page carries a text layer (scanned image only).
    #[error("document has no extractable text")]
    NoText,

    /// Required field is missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Errors raised while mapping labels onto remote ids.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The lookup ran but matched nothing.
    #[error("{entity} '{key}' not found in the ledger")]
    NotFound { entity: &'static str, key: String },

    /// Partner resolution needs a VAT number.
    #[error("customer VAT number is required")]
    MissingVat,

    /// The lookup itself failed.
    #[error(transparent)]
    Remote(#[from] facto_ledger::LedgerError),
}

/// Step of the posting sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingStage {
    DuplicateCheck,
    Create,
    Attach,
    Post,
}

impl std::fmt::Display for PostingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PostingStage::DuplicateCheck => "duplicate check",
            PostingStage::Create => "create",
            PostingStage::Attach => "attach",
            PostingStage::Post => "post",
        };
        f.write_str(name)
    }
}

/// Errors raised by the invoice poster.
#[derive(Error, Debug)]
pub enum PostingError {
    /// A field required for posting is absent.
    #[error("missing {0}")]
    MissingField(&'static str),

    /// Every tax bucket is zero: there is nothing to invoice.
    #[error("no invoice lines generated: all tax buckets are zero")]
    NoInvoiceLines,

    /// Partner, journal, account or tax could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A remote call in the posting sequence failed.
    #[error("{stage} failed: {source}")]
    Remote {
        stage: PostingStage,
        #[source]
        source: facto_ledger::LedgerError,
    },

    /// The source document could not be read for attaching.
    #[error("cannot read source document: {0}")]
    Io(#[from] std::io::Error),
}

/// Permanent delivery failures. A pending verification is not an error.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The partner's endpoint check failed: it is not on the Peppol network.
    #[error("partner not reachable on Peppol")]
    PartnerNotReachable,

    /// The invoice's previous transmission ended in error.
    #[error("invoice Peppol error, manual intervention required")]
    InvoiceInError,

    /// The invoice has no partner to deliver to.
    #[error("invoice {0} has no partner")]
    MissingPartner(facto_ledger::RecordId),

    /// The invoice id is unknown to the ledger.
    #[error("invoice {0} not found")]
    InvoiceNotFound(facto_ledger::RecordId),

    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] facto_ledger::LedgerError),
}

/// Result type for the facto library.
pub type Result<T> = std::result::Result<T, FactoError>;
