//! Euro amount parsing and footer totals.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::invoice::TaxTotals;

use super::patterns::{BASIS, GRAND_TOTAL, VAT_BUCKET};

/// Parse a European-formatted amount such as `"1.234,56 €"`.
///
/// Dots are thousands separators and the comma is the decimal mark.
/// Anything unparseable yields zero.
pub fn parse_amount(s: &str) -> Decimal {
    let cleaned: String = s
        .chars()
        .filter(|c| *c != '€' && *c != '.' && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

/// Format an amount the way the template prints it (`1.234,56`).
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.round_dp(2));
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let Some((integer_part, decimal_part)) = digits.split_once('.') else {
        return s;
    };

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    format!("{}{},{}", sign, formatted, decimal_part)
}

/// Read the footer block: basis, one bucket line per VAT rate, grand total.
///
/// Lines that are absent leave their field at zero. Buckets other than
/// 0%, 6% and 21% are ignored.
pub fn extract_tax_totals(text: &str) -> TaxTotals {
    let mut totals = TaxTotals::default();

    if let Some(caps) = BASIS.captures(text) {
        totals.basis = parse_amount(&caps[1]);
    }

    for caps in VAT_BUCKET.captures_iter(text) {
        let amount = parse_amount(&caps[2]);
        match &caps[1] {
            "0" => totals.rate_0_total = amount,
            "6" => totals.rate_6_total = amount,
            "21" => totals.rate_21_total = amount,
            other => tracing::debug!("Ignoring unsupported VAT rate {}%", other),
        }
    }

    if let Some(caps) = GRAND_TOTAL.captures(text) {
        totals.grand_total = parse_amount(&caps[1]);
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.234,56 €"), dec("1234.56"));
        assert_eq!(parse_amount("15,00"), dec("15.00"));
        assert_eq!(parse_amount("0,00"), Decimal::ZERO);
        assert_eq!(parse_amount(" 12.345.678,90€ "), dec("12345678.90"));
    }

    #[test]
    fn test_parse_amount_malformed_is_zero() {
        assert_eq!(parse_amount("n.v.t."), Decimal::ZERO);
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("12,34,56"), Decimal::ZERO);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("1234.56")), "1.234,56");
        assert_eq!(format_amount(dec("15")), "15,00");
        assert_eq!(format_amount(dec("-1000000.5")), "-1.000.000,50");
    }

    #[test]
    fn test_extract_tax_totals() {
        let text = "Basis 1.015,00 €\n\
                    Btw 6% op 15,00 € 0,90 €\n\
                    Btw 21% op 1.000,00 € 210,00 €\n\
                    Totaal 1.225,90 €";

        let totals = extract_tax_totals(text);
        assert_eq!(
            totals,
            TaxTotals {
                basis: dec("1015.00"),
                rate_0_total: Decimal::ZERO,
                rate_6_total: dec("15.00"),
                rate_21_total: dec("1000.00"),
                grand_total: dec("1225.90"),
            }
        );
    }

    #[test]
    fn test_extract_tax_totals_empty() {
        assert_eq!(extract_tax_totals("no footer here"), TaxTotals::default());
    }
}
