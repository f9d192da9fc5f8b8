//! Line item rows: quantity, description, line total, unit price.

use crate::models::invoice::LineItem;

use super::amounts::parse_amount;
use super::patterns::LINE_ITEM;

/// Parse one table row, if the line is one.
pub fn parse_line_item(line: &str) -> Option<LineItem> {
    let caps = LINE_ITEM.captures(line)?;
    Some(LineItem {
        quantity: caps["qty"].parse().ok()?,
        description: caps["desc"].trim_matches(|c| c == ',' || c == ' ').to_string(),
        unit_price: parse_amount(&caps["unit"]),
        total: parse_amount(&caps["total"]),
    })
}

/// Parse every item row in a page's text.
pub fn extract_line_items(text: &str) -> Vec<LineItem> {
    text.lines().filter_map(parse_line_item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_parse_line_item() {
        let item = parse_line_item("2 Duck Roasted Boneless 650g, 15,00 € 7,50 €").unwrap();
        assert_eq!(
            item,
            LineItem {
                quantity: 2,
                description: "Duck Roasted Boneless 650g".to_string(),
                unit_price: Decimal::from_str("7.50").unwrap(),
                total: Decimal::from_str("15.00").unwrap(),
            }
        );
    }

    #[test]
    fn test_quoted_cells() {
        let item = parse_line_item("\"3\" \"Paté\" 1.050,00 € 350,00 €").unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.description, "Paté");
        assert_eq!(item.total, Decimal::from_str("1050.00").unwrap());
    }

    #[test]
    fn test_non_rows_are_skipped() {
        let text = "Aantal Omschrijving Bedrag Prijs\n1 Soep 4,00 € 4,00 €\nBasis 4,00 €\nBtw 6% op 4,00 € 0,24 €";
        let items = extract_line_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Soep");
    }
}
