//! Buyer block extraction, anchored on the postal-code line.

use crate::models::invoice::Buyer;

use super::patterns::{PHONE, POSTAL_LINE, VAT_NUMBER};
use super::vat::VatNumberExtractor;
use super::FieldExtractor;

/// Extract the buyer from the text of the buyer zone.
///
/// The block is read as: name, street, `zip city`, then optional phone and
/// VAT lines. The first postal line anchors the block; street and name are
/// the one and two lines directly above it. When the zone carries several
/// VAT numbers a Belgian one wins.
pub fn extract_buyer(text: &str) -> Buyer {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut buyer = Buyer::default();
    let mut vat_lines: Vec<&str> = Vec::new();
    let mut anchored = false;

    for (i, line) in lines.iter().enumerate() {
        if VAT_NUMBER.is_match(line) {
            vat_lines.push(line);
            continue;
        }

        if let Some(caps) = PHONE.captures(line) {
            if buyer.phone.is_none() {
                buyer.phone = Some(caps["num"].trim().to_string());
            }
            continue;
        }

        if anchored {
            continue;
        }
        if let Some(caps) = POSTAL_LINE.captures(line) {
            buyer.postal_code = caps["zip"].to_string();
            buyer.city = caps["city"].to_string();
            if i >= 1 {
                buyer.street = lines[i - 1].to_string();
            }
            if i >= 2 {
                buyer.name = lines[i - 2].to_string();
            }
            anchored = true;
        }
    }

    buyer.vat_number = VatNumberExtractor::new()
        .with_validation(false)
        .extract(&vat_lines.join("\n"))
        .map(|m| m.value);

    buyer
}
