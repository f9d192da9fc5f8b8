//! Invoice data recovered from the Belgian sales-invoice template.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A complete parsed invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInvoice {
    /// Invoice number; the dedup key in the ledger.
    pub invoice_number: String,

    /// Invoice date (printed day-month-year, serialized year-month-day).
    pub invoice_date: NaiveDate,

    /// Buyer block from the top-right of the first page.
    pub buyer: Buyer,

    /// Line items in document order across all pages.
    #[serde(default)]
    pub line_items: Vec<LineItem>,

    /// Footer totals.
    pub tax_totals: TaxTotals,
}

/// The invoiced customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    /// Company or person name.
    pub name: String,

    /// Street and number.
    pub street: String,

    /// Four-digit Belgian postal code.
    pub postal_code: String,

    /// City name.
    pub city: String,

    /// Phone number as printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// VAT number, normalized (`BE0123456789`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,
}

impl Buyer {
    /// Format the address as a single line.
    pub fn address_line(&self) -> String {
        let mut parts = Vec::new();
        if !self.street.is_empty() {
            parts.push(self.street.clone());
        }
        let locality = format!("{} {}", self.postal_code, self.city);
        if !locality.trim().is_empty() {
            parts.push(locality.trim().to_string());
        }
        parts.join(", ")
    }
}

/// A single line item on the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Quantity.
    pub quantity: u32,

    /// Product description.
    pub description: String,

    /// Price per unit.
    pub unit_price: Decimal,

    /// Line total.
    pub total: Decimal,
}

/// Footer totals. Absent entries are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxTotals {
    /// Taxable basis.
    pub basis: Decimal,

    /// Amount taxed at 0%.
    pub rate_0_total: Decimal,

    /// Amount taxed at 6%.
    pub rate_6_total: Decimal,

    /// Amount taxed at 21%.
    pub rate_21_total: Decimal,

    /// Amount payable.
    pub grand_total: Decimal,
}

impl TaxTotals {
    /// Amount in the given bucket.
    pub fn bucket(&self, bucket: TaxBucket) -> Decimal {
        match bucket {
            TaxBucket::Exempt => self.rate_0_total,
            TaxBucket::Reduced6 => self.rate_6_total,
            TaxBucket::Standard21 => self.rate_21_total,
        }
    }

    /// Buckets with a positive amount, lowest rate first.
    pub fn non_zero_buckets(&self) -> Vec<(TaxBucket, Decimal)> {
        TaxBucket::ALL
            .iter()
            .map(|&bucket| (bucket, self.bucket(bucket)))
            .filter(|(_, amount)| *amount > Decimal::ZERO)
            .collect()
    }
}

/// Belgian VAT rate groups an invoice line can fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxBucket {
    /// Exempt: 0%
    #[serde(rename = "0")]
    Exempt,

    /// Food and groceries: 6%
    #[serde(rename = "6")]
    Reduced6,

    /// Everything else: 21%
    #[serde(rename = "21")]
    Standard21,
}

impl TaxBucket {
    /// All buckets in ascending rate order.
    pub const ALL: [TaxBucket; 3] = [TaxBucket::Exempt, TaxBucket::Reduced6, TaxBucket::Standard21];

    /// Rate in percent, as the ledger stores it on the tax record.
    pub fn rate(&self) -> f64 {
        match self {
            TaxBucket::Exempt => 0.0,
            TaxBucket::Reduced6 => 6.0,
            TaxBucket::Standard21 => 21.0,
        }
    }

    /// Invoice line label.
    pub fn label(&self) -> &'static str {
        match self {
            TaxBucket::Exempt => "Vrijgesteld",
            TaxBucket::Reduced6 => "Voeding en levensmiddelen",
            TaxBucket::Standard21 => "Divers/non-food",
        }
    }

    /// Format for display.
    pub fn display(&self) -> String {
        format!("{}%", self.rate())
    }
}

impl ParsedInvoice {
    /// Name for the archived copy: `Company_YYYYMMDD_Number.pdf`.
    ///
    /// Only alphanumerics of the buyer name are kept.
    pub fn archive_filename(&self) -> String {
        let company: String = self
            .buyer
            .name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        let company = if company.is_empty() { "unknown".to_string() } else { company };

        let date = self.invoice_date.format("%Y%m%d");

        let number: String = self
            .invoice_number
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect();

        format!("{}_{}_{}.pdf", company, date, number)
    }

    /// Check the record for inconsistencies that do not block posting.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.buyer.vat_number.is_none() {
            issues.push("Missing buyer VAT number".to_string());
        }

        if self.buyer.name.is_empty() {
            issues.push("Missing buyer name".to_string());
        }

        if self.line_items.is_empty() {
            issues.push("No line items".to_string());
        }

        if self.tax_totals.non_zero_buckets().is_empty() {
            issues.push("All tax buckets are zero".to_string());
        }

        // Buckets should add up to the printed basis
        let buckets: Decimal = TaxBucket::ALL.iter().map(|&b| self.tax_totals.bucket(b)).sum();
        if !self.tax_totals.basis.is_zero() && (buckets - self.tax_totals.basis).abs() > Decimal::new(1, 2) {
            issues.push(format!(
                "Tax buckets ({}) differ from basis ({})",
                buckets, self.tax_totals.basis
            ));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample() -> ParsedInvoice {
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
            line_items: vec![LineItem {
                quantity: 2,
                description: "Duck".to_string(),
                unit_price: Decimal::from_str("7.50").unwrap(),
                total: Decimal::from_str("15.00").unwrap(),
            }],
            tax_totals: TaxTotals {
                basis: Decimal::from_str("15.00").unwrap(),
                rate_6_total: Decimal::from_str("15.00").unwrap(),
                grand_total: Decimal::from_str("15.90").unwrap(),
                ..TaxTotals::default()
            },
        }
    }

    #[test]
    fn test_archive_filename() {
        assert_eq!(sample().archive_filename(), "AcmeFoodBV_20251219_7216.pdf");
    }

    #[test]
    fn test_archive_filename_strips_punctuation() {
        let mut invoice = sample();
        invoice.buyer.name = "De Smet & Zonen, b.v.".to_string();
        assert_eq!(invoice.archive_filename(), "DeSmetZonenbv_20251219_7216.pdf");

        invoice.buyer.name = String::new();
        assert_eq!(invoice.archive_filename(), "unknown_20251219_7216.pdf");
    }

    #[test]
    fn test_non_zero_buckets() {
        let buckets = sample().tax_totals.non_zero_buckets();
        assert_eq!(buckets, vec![(TaxBucket::Reduced6, Decimal::from_str("15.00").unwrap())]);
    }

    #[test]
    fn test_validate_consistent_invoice() {
        assert!(sample().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_basis_mismatch() {
        let mut invoice = sample();
        invoice.tax_totals.basis = Decimal::from_str("20.00").unwrap();
        let issues = invoice.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("differ from basis"));
    }

    #[test]
    fn test_date_serializes_iso() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["invoice_date"], "2025-12-19");
    }

    #[test]
    fn test_address_line() {
        assert_eq!(sample().buyer.address_line(), "Kerkstraat 1, 9200 Dendermonde");
        assert_eq!(Buyer::default().address_line(), "");
    }
}
