//! In-memory PDFs laid out like the sales-invoice template.
//!
//! Only compiled with the `fixtures` feature; the test suites of this and
//! the CLI crate build their documents here instead of shipping binaries.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use super::fonts::encode_win_ansi;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;

/// Text drawn at a position measured from the top-left corner.
#[derive(Debug, Clone)]
pub struct Placement {
    pub x: i64,
    pub top: i64,
    pub size: i64,
    pub text: String,
}

impl Placement {
    pub fn new(x: i64, top: i64, text: impl Into<String>) -> Self {
        Self {
            x,
            top,
            size: 10,
            text: text.into(),
        }
    }
}

/// Build an A4 document with one Helvetica text object per placement.
pub fn build_pdf(pages: &[Vec<Placement>]) -> lopdf::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for placements in pages {
        let mut operations = Vec::new();
        for p in placements {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), p.size.into()]));
            operations.push(Operation::new("Td", vec![p.x.into(), (PAGE_HEIGHT - p.top).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&p.text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// One table row: quantity, description, line total, unit price (as printed).
#[derive(Debug, Clone)]
pub struct FixtureItem {
    pub quantity: u32,
    pub description: String,
    pub total: String,
    pub unit: String,
}

/// One VAT footer line: rate, bucket total, tax (as printed).
#[derive(Debug, Clone)]
pub struct FixtureVat {
    pub rate: u32,
    pub bucket_total: String,
    pub tax: String,
}

/// Field values for a template invoice.
#[derive(Debug, Clone)]
pub struct FixtureInvoice {
    pub number: String,
    pub date: String,
    pub buyer_name: String,
    pub street: String,
    pub postal_city: String,
    pub phone: Option<String>,
    pub vat: Option<String>,
    pub items: Vec<FixtureItem>,
    pub basis: String,
    pub vat_lines: Vec<FixtureVat>,
    pub grand_total: String,
}

impl FixtureInvoice {
    /// Invoice 7216 of 19-12-2025 for a buyer with VAT BE0123456789, one 6% bucket of 15,00 €.
    pub fn sample() -> Self {
        Self {
            number: "7216".to_string(),
            date: "19-12-2025".to_string(),
            buyer_name: "Acme Food BV".to_string(),
            street: "Kerkstraat 1".to_string(),
            postal_city: "9200 Dendermonde".to_string(),
            phone: Some("Tel 052 12 34 56".to_string()),
            vat: Some("BTW BE 0123.456.789".to_string()),
            items: vec![
                FixtureItem {
                    quantity: 2,
                    description: "Eendenborst".to_string(),
                    total: "10,00 €".to_string(),
                    unit: "5,00 €".to_string(),
                },
                FixtureItem {
                    quantity: 1,
                    description: "Paté, huisgemaakt".to_string(),
                    total: "5,00 €".to_string(),
                    unit: "5,00 €".to_string(),
                },
            ],
            basis: "15,00 €".to_string(),
            vat_lines: vec![FixtureVat {
                rate: 6,
                bucket_total: "15,00 €".to_string(),
                tax: "0,90 €".to_string(),
            }],
            grand_total: "15,90 €".to_string(),
        }
    }

    /// Lay the invoice out on a single page.
    pub fn placements(&self) -> Vec<Placement> {
        let mut out = vec![
            // Seller block, left column
            Placement::new(50, 60, "Traiteur De Smet"),
            Placement::new(50, 74, "Markt 5"),
            Placement::new(50, 88, "9000 Gent"),
            Placement::new(50, 102, "Tel 09 222 33 44"),
            Placement::new(50, 116, "BTW BE 0999.999.999"),
        ];

        // Buyer block, right column
        let mut top = 120;
        for line in [Some(&self.buyer_name), Some(&self.street), Some(&self.postal_city)]
            .into_iter()
            .chain([self.phone.as_ref(), self.vat.as_ref()])
            .flatten()
        {
            out.push(Placement::new(320, top, line.clone()));
            top += 14;
        }

        out.push(Placement::new(50, 260, format!("Faktuur {}", self.number)));
        out.push(Placement::new(50, 275, format!("Datum {}", self.date)));

        out.push(Placement::new(50, 320, "Aantal"));
        out.push(Placement::new(90, 320, "Omschrijving"));
        out.push(Placement::new(400, 320, "Bedrag"));
        out.push(Placement::new(480, 320, "Prijs"));

        let mut top = 340;
        for item in &self.items {
            out.push(Placement::new(50, top, item.quantity.to_string()));
            out.push(Placement::new(90, top, item.description.clone()));
            out.push(Placement::new(400, top, item.total.clone()));
            out.push(Placement::new(480, top, item.unit.clone()));
            top += 16;
        }

        out.extend(self.footer(600));
        out
    }

    fn footer(&self, start: i64) -> Vec<Placement> {
        let mut out = vec![
            Placement::new(350, start, "Basis"),
            Placement::new(480, start, self.basis.clone()),
        ];
        let mut top = start + 14;
        for line in &self.vat_lines {
            out.push(Placement::new(350, top, format!("Btw {}% op", line.rate)));
            out.push(Placement::new(420, top, line.bucket_total.clone()));
            out.push(Placement::new(480, top, line.tax.clone()));
            top += 14;
        }
        out.push(Placement::new(350, top, "Totaal"));
        out.push(Placement::new(480, top, self.grand_total.clone()));
        out
    }

    /// Render as a one-page PDF.
    pub fn to_pdf(&self) -> lopdf::Result<Vec<u8>> {
        build_pdf(&[self.placements()])
    }
}

/// A one-page PDF without any text layer.
pub fn blank_pdf() -> lopdf::Result<Vec<u8>> {
    build_pdf(&[Vec::new()])
}
