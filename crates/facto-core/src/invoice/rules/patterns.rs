//! Regex patterns for the Belgian (Dutch-language) invoice template.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Invoice number: "Faktuur 7216", also the usual spellings and labels
    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)\b(?:faktuur|factuur|invoice)(?:\s*(?:nr|no|nummer)\.?)?[\s:]*([A-Za-z]{0,4}[-/]?\d[\w/\-]*)"
    ).unwrap();

    // Dates printed day-month-year
    pub static ref INVOICE_DATE: Regex = Regex::new(
        r"(?i)\b(?:datum|date|factuurdatum|faktuurdatum)[\s:]*(\d{1,2})[-./](\d{1,2})[-./](\d{4})\b"
    ).unwrap();

    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[-./](\d{1,2})[-./](\d{4})\b"
    ).unwrap();

    // VAT number, e.g. "BE 0123.456.789"
    pub static ref VAT_NUMBER: Regex = Regex::new(
        r"(?i)\b([A-Z]{2})\s?(\d[\d.]{9,13})"
    ).unwrap();

    // Phone behind a label
    pub static ref PHONE: Regex = Regex::new(
        r"(?i)(?:Tel|Mobile|GSM|Telefoon|Phone)[\s.:]*(?P<num>[\d.\s/+\-]{8,})"
    ).unwrap();

    // Belgian postal line: four digits then the city
    pub static ref POSTAL_LINE: Regex = Regex::new(
        r"^\s*(?P<zip>\d{4})\s+(?P<city>\S.*?)\s*$"
    ).unwrap();

    // Item row: quantity, description, line total, unit price
    pub static ref LINE_ITEM: Regex = Regex::new(
        r#"^\s*"?(?P<qty>\d+)"?\s+"?(?P<desc>.+?)"?\s+(?P<total>[\d.,]+\s*€)\s+(?P<unit>[\d.,]+\s*€)"#
    ).unwrap();

    // Footer totals
    pub static ref BASIS: Regex = Regex::new(
        r"(?i)\bBasis\s+([\d.,]+)\s*€"
    ).unwrap();

    pub static ref VAT_BUCKET: Regex = Regex::new(
        r"(?i)\bBtw\s+(\d{1,2})\s*%\s+op\s+([\d.,]+)\s*€\s+([\d.,]+)\s*€"
    ).unwrap();

    pub static ref GRAND_TOTAL: Regex = Regex::new(
        r"(?i)\bTotaal\s+([\d.,]+)\s*€"
    ).unwrap();
}
