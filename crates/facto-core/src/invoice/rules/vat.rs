//! VAT number extraction and Belgian checksum validation.

use super::patterns::VAT_NUMBER;
use super::{ExtractionMatch, FieldExtractor};

/// VAT number extractor. Belgian numbers are preferred over foreign ones.
pub struct VatNumberExtractor {
    validate: bool,
}

impl VatNumberExtractor {
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Enable or disable checksum validation.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for VatNumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for VatNumberExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let all = self.extract_all(text);
        let belgian = all.iter().position(|m| m.value.starts_with("BE"));
        all.into_iter().nth(belgian.unwrap_or(0))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        VAT_NUMBER
            .captures_iter(text)
            .filter_map(|caps| {
                let m = caps.get(0)?;
                let value = normalize_vat(m.as_str());
                let digits = value.len() - 2;
                if !(8..=12).contains(&digits) {
                    return None;
                }
                // A failed checksum lowers confidence but keeps the match
                let confidence = if self.validate && value.starts_with("BE") && !validate_be_vat(&value) {
                    0.5
                } else {
                    0.95
                };
                Some(ExtractionMatch::new(value, confidence, m.as_str()).with_position(m.start(), m.end()))
            })
            .collect()
    }
}

/// Strip spaces and dots: `"BE 0123.456.789"` becomes `"BE0123456789"`.
pub fn normalize_vat(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_uppercase()
}

/// Check a Belgian enterprise number: 97 minus the first eight digits
/// modulo 97 must equal the last two. Old nine-digit numbers get a leading zero.
pub fn validate_be_vat(vat: &str) -> bool {
    let digits: String = vat.trim_start_matches("BE").chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.len() {
        9 => format!("0{}", digits),
        10 => digits,
        _ => return false,
    };
    if !digits.starts_with('0') && !digits.starts_with('1') {
        return false;
    }

    let (Ok(base), Ok(check)) = (digits[..8].parse::<u64>(), digits[8..].parse::<u64>()) else {
        return false;
    };
    97 - base % 97 == check
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_vat() {
        assert_eq!(normalize_vat("BE 0123.456.789"), "BE0123456789");
        assert_eq!(normalize_vat("be0477 472 701"), "BE0477472701");
    }

    #[test]
    fn test_validate_be_vat() {
        // 04774727 mod 97 = 96, 97 - 96 = 1
        assert!(validate_be_vat("BE0477472701"));
        assert!(validate_be_vat("BE477472701"));
        assert!(!validate_be_vat("BE0477472702"));
        assert!(!validate_be_vat("BE0123456789"));
        assert!(!validate_be_vat("BE12345"));
    }

    #[test]
    fn test_extract_prefers_belgian_number() {
        let text = "NL 8123.45.678.B01\nBTW BE 0477.472.701";
        let found = VatNumberExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "BE0477472701");
        assert_eq!(found.confidence, 0.95);
    }

    #[test]
    fn test_invalid_checksum_is_kept() {
        let found = VatNumberExtractor::new().extract("BTW BE0123456789").unwrap();
        assert_eq!(found.value, "BE0123456789");
        assert_eq!(found.confidence, 0.5);

        let unchecked = VatNumberExtractor::new()
            .with_validation(false)
            .extract("BTW BE0123456789")
            .unwrap();
        assert_eq!(unchecked.confidence, 0.95);
    }

    #[test]
    fn test_short_numbers_are_rejected() {
        assert!(VatNumberExtractor::new().extract("Tel 052 12 34 56").is_none());
        assert!(VatNumberExtractor::new().extract("Rekening 12").is_none());
    }
}
