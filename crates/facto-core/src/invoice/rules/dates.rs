//! Invoice date extraction.

use chrono::NaiveDate;
use regex::Captures;

use super::patterns::{DATE_DMY, INVOICE_DATE};
use super::{ExtractionMatch, FieldExtractor};

/// Day-month-year date extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        DATE_DMY
            .captures_iter(text)
            .filter_map(|caps| {
                let m = caps.get(0)?;
                let date = date_from(&caps)?;
                Some(ExtractionMatch::new(date, 0.7, m.as_str()).with_position(m.start(), m.end()))
            })
            .collect()
    }
}

fn date_from(caps: &Captures) -> Option<NaiveDate> {
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Find the invoice date: the labelled `Datum` first, else the first valid
/// day-month-year date in the text.
pub fn extract_invoice_date(text: &str) -> Option<ExtractionMatch<NaiveDate>> {
    for caps in INVOICE_DATE.captures_iter(text) {
        if let Some(date) = date_from(&caps) {
            return Some(ExtractionMatch::new(date, 0.95, &caps[0]));
        }
    }

    DateExtractor::new().extract(text)
}
