//! Font lookups needed to turn string operands into text and advances.

use lazy_static::lazy_static;
use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref CMAP_TOKEN: Regex = Regex::new(r"<([0-9A-Fa-f]*)>|\[|\]").unwrap();
    static ref BFCHAR: Regex = Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE: Regex = Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
}

/// WinAnsi code points for 0x80..=0x9F; the rest of the table is Latin-1.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// Decode one WinAnsi byte.
pub fn win_ansi_char(byte: u8) -> Option<char> {
    match byte {
        0x80..=0x9F => WIN_ANSI_HIGH[(byte - 0x80) as usize],
        _ => Some(byte as char),
    }
}

/// Encode text as WinAnsi, replacing unmappable characters with `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) {
                return c as u8;
            }
            WIN_ANSI_HIGH
                .iter()
                .position(|&m| m == Some(c))
                .map(|i| 0x80 + i as u8)
                .unwrap_or(b'?')
        })
        .collect()
}

/// What the text interpreter needs to know about a font.
#[derive(Debug, Clone, Default)]
pub struct FontInfo {
    /// Composite font: codes are two bytes wide.
    pub two_byte: bool,
    to_unicode: Option<HashMap<u32, String>>,
    first_char: i64,
    widths: Vec<f64>,
    default_width: f64,
}

/// One decoded glyph.
pub struct Glyph {
    pub text: String,
    /// Advance in text-space units per 1000 em.
    pub width: f64,
    /// Single-byte code 32 gets word spacing.
    pub is_space: bool,
}

impl FontInfo {
    /// Read the font dictionary.
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let two_byte = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|name| name == b"Type0");

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, obj)| match obj {
                Object::Stream(stream) => Some(stream),
                _ => None,
            })
            .map(|stream| {
                let data = match stream.decompressed_content() {
                    Ok(d) => d,
                    Err(_) => stream.content.clone(),
                };
                parse_to_unicode(&String::from_utf8_lossy(&data))
            })
            .filter(|map| !map.is_empty());

        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, obj)| obj.as_array().ok())
            .map(|arr| arr.iter().map(|o| number(o).unwrap_or(0.0)).collect())
            .unwrap_or_default();

        Self {
            two_byte,
            to_unicode,
            first_char,
            widths,
            default_width: if two_byte { 1000.0 } else { 500.0 },
        }
    }

    /// Split a string operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| if c.len() == 2 { (c[0] as u32) << 8 | c[1] as u32 } else { c[0] as u32 })
                .collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        };

        codes
            .into_iter()
            .map(|code| {
                let text = match &self.to_unicode {
                    Some(map) => map.get(&code).cloned().unwrap_or_default(),
                    None if self.two_byte => String::new(),
                    None => win_ansi_char(code as u8).map(String::from).unwrap_or_default(),
                };
                Glyph {
                    text,
                    width: self.width_of(code),
                    is_space: !self.two_byte && code == 32,
                }
            })
            .collect()
    }

    fn width_of(&self, code: u32) -> f64 {
        let index = code as i64 - self.first_char;
        if index >= 0 {
            if let Some(&w) = self.widths.get(index as usize) {
                if w > 0.0 {
                    return w;
                }
            }
        }
        self.default_width
    }
}

/// Numeric operand as f64.
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
fn parse_to_unicode(cmap: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();

    for section in BFCHAR.captures_iter(cmap) {
        let tokens = hex_tokens(&section[1]);
        for pair in tokens.chunks(2) {
            if let [Token::Hex(src), Token::Hex(dst)] = pair {
                map.insert(hex_code(src), utf16_hex(dst));
            }
        }
    }

    for section in BFRANGE.captures_iter(cmap) {
        let tokens = hex_tokens(&section[1]);
        let mut i = 0;
        while i + 2 < tokens.len() {
            let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                i += 1;
                continue;
            };
            let (lo, hi) = (hex_code(lo), hex_code(hi));
            match &tokens[i + 2] {
                Token::Hex(dst) => {
                    let base: Vec<u16> = utf16_units(dst);
                    for (offset, code) in (lo..=hi).enumerate() {
                        let mut units = base.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(offset as u16);
                        }
                        map.insert(code, String::from_utf16_lossy(&units));
                    }
                    i += 3;
                }
                Token::Open => {
                    let mut j = i + 3;
                    let mut code = lo;
                    while j < tokens.len() && !matches!(tokens[j], Token::Close) {
                        if let Token::Hex(dst) = &tokens[j] {
                            if code <= hi {
                                map.insert(code, utf16_hex(dst));
                            }
                            code += 1;
                        }
                        j += 1;
                    }
                    i = j + 1;
                }
                Token::Close => i += 3,
            }
        }
    }

    map
}

enum Token {
    Hex(String),
    Open,
    Close,
}

fn hex_tokens(section: &str) -> Vec<Token> {
    CMAP_TOKEN
        .captures_iter(section)
        .map(|c| match c.get(1) {
            Some(hex) => Token::Hex(hex.as_str().to_string()),
            None if &c[0] == "[" => Token::Open,
            None => Token::Close,
        })
        .collect()
}

fn hex_code(hex: &str) -> u32 {
    u32::from_str_radix(hex, 16).unwrap_or(0)
}

fn utf16_units(hex: &str) -> Vec<u16> {
    hex.as_bytes()
        .chunks(4)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .filter_map(|c| u16::from_str_radix(c, 16).ok())
        .collect()
}

fn utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&utf16_units(hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_round_trip_euro() {
        let bytes = encode_win_ansi("15,00 €");
        assert_eq!(bytes.last(), Some(&0x80));
        let decoded: String = bytes.iter().filter_map(|&b| win_ansi_char(b)).collect();
        assert_eq!(decoded, "15,00 €");
    }

    #[test]
    fn test_win_ansi_latin1() {
        assert_eq!(win_ansi_char(0xE9), Some('é'));
        assert_eq!(win_ansi_char(0x81), None);
        assert_eq!(encode_win_ansi("→"), b"?");
    }

    #[test]
    fn test_parse_to_unicode() {
        let cmap = "1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
                    2 beginbfchar\n<0003> <0020>\n<0011> <20AC>\nendbfchar\n\
                    2 beginbfrange\n<0024> <0026> <0041>\n<0030> <0031> [<0062> <0063>]\nendbfrange";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("€"));
        assert_eq!(map.get(&0x25).map(String::as_str), Some("B"));
        assert_eq!(map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("c"));
    }

    #[test]
    fn test_decode_two_byte_font() {
        let font = FontInfo {
            two_byte: true,
            to_unicode: Some(HashMap::from([(0x0024, "A".to_string()), (0x0003, " ".to_string())])),
            default_width: 1000.0,
            ..FontInfo::default()
        };
        let text: String = font.decode(&[0x00, 0x24, 0x00, 0x03]).into_iter().map(|g| g.text).collect();
        assert_eq!(text, "A ");
    }

    #[test]
    fn test_widths_lookup() {
        let font = FontInfo {
            first_char: 32,
            widths: vec![278.0, 0.0],
            default_width: 500.0,
            ..FontInfo::default()
        };
        let glyphs = font.decode(b" !A");
        assert_eq!(glyphs[0].width, 278.0);
        assert!(glyphs[0].is_space);
        assert_eq!(glyphs[1].width, 500.0);
        assert_eq!(glyphs[2].width, 500.0);
    }
}
