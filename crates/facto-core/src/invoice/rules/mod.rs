//! Rule-based field extractors for the Belgian invoice template.

pub mod amounts;
pub mod buyer;
pub mod dates;
pub mod items;
pub mod patterns;
pub mod vat;

pub use amounts::{extract_tax_totals, format_amount, parse_amount};
pub use buyer::extract_buyer;
pub use dates::{extract_invoice_date, DateExtractor};
pub use items::{extract_line_items, parse_line_item};
pub use patterns::*;
pub use vat::{normalize_vat, validate_be_vat, VatNumberExtractor};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A matched value with where it came from.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Byte range in the source text.
    pub position: Option<(usize, usize)>,
    /// Matched text.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
