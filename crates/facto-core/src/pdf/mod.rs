//! PDF page reading with text positions.
//!
//! Pages expose their text both as plain lines and as positioned runs so
//! callers can crop a region (the buyer block sits in a fixed zone of the
//! template) before matching.

mod fonts;
mod reader;

#[cfg(feature = "fixtures")]
pub mod fixtures;

pub use reader::PdfReader;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// A piece of text drawn at one position. Coordinates are in points with
/// the origin at the top-left corner of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Left edge.
    pub x: f64,
    /// Baseline distance from the top of the page.
    pub top: f64,
    /// Advance width.
    pub width: f64,
    /// Effective font size.
    pub font_size: f64,
}

/// Rectangle in top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl CropBox {
    /// Create a crop box.
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self { x0, top, x1, bottom }
    }

    /// Whether a run starts inside the box.
    pub fn contains(&self, run: &TextRun) -> bool {
        run.x >= self.x0 && run.x < self.x1 && run.top >= self.top && run.top <= self.bottom
    }
}

/// Page-level text access used by the field extractor.
pub trait PageSource {
    /// Page text, one line per visual line.
    fn text(&self) -> String;

    /// Page width in points.
    fn width(&self) -> f64;

    /// Page height in points.
    fn height(&self) -> f64;

    /// Restrict the page to a region.
    fn crop(&self, bbox: CropBox) -> Box<dyn PageSource + '_>;
}

/// A single page of a loaded document.
#[derive(Debug, Clone, Default)]
pub struct PdfPage {
    /// Page number (1-indexed).
    pub number: u32,
    width: f64,
    height: f64,
    runs: Vec<TextRun>,
    /// Plain text used when the page has no positioned runs.
    fallback_text: Option<String>,
}

impl PdfPage {
    /// Build a page from positioned runs.
    pub fn from_runs(number: u32, width: f64, height: f64, runs: Vec<TextRun>) -> Self {
        Self {
            number,
            width,
            height,
            runs,
            fallback_text: None,
        }
    }

    /// Build a page from plain text without geometry.
    pub fn from_text(number: u32, width: f64, height: f64, text: impl Into<String>) -> Self {
        Self {
            number,
            width,
            height,
            runs: Vec::new(),
            fallback_text: Some(text.into()),
        }
    }

    /// Positioned runs in drawing order.
    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Whether the page carries positions.
    pub fn has_layout(&self) -> bool {
        !self.runs.is_empty()
    }

    /// Whether the page has any non-blank text.
    pub fn has_text(&self) -> bool {
        self.runs.iter().any(|r| !r.text.trim().is_empty())
            || self.fallback_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Group runs into visual lines, top to bottom, left to right.
    pub fn lines(&self) -> Vec<String> {
        if let Some(text) = &self.fallback_text {
            return text.lines().map(|l| l.to_string()).collect();
        }

        let mut runs: Vec<&TextRun> = self.runs.iter().filter(|r| !r.text.is_empty()).collect();
        runs.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x.total_cmp(&b.x)));

        let mut grouped: Vec<Vec<&TextRun>> = Vec::new();
        for run in runs {
            let same_line = grouped.last().is_some_and(|line| {
                let anchor = line[0];
                let tolerance = (anchor.font_size.min(run.font_size) * 0.3).max(2.0);
                (run.top - anchor.top).abs() <= tolerance
            });
            match grouped.last_mut() {
                Some(line) if same_line => line.push(run),
                _ => grouped.push(vec![run]),
            }
        }

        grouped
            .into_iter()
            .map(|mut line| {
                line.sort_by(|a, b| a.x.total_cmp(&b.x));
                join_line(&line)
            })
            .filter(|l| !l.trim().is_empty())
            .collect()
    }

    /// Keep only runs starting inside `bbox`.
    ///
    /// A page without positions cannot be cropped; the region comes back empty.
    pub fn cropped(&self, bbox: CropBox) -> PdfPage {
        PdfPage {
            number: self.number,
            width: (bbox.x1 - bbox.x0).max(0.0),
            height: (bbox.bottom - bbox.top).max(0.0),
            runs: self.runs.iter().filter(|r| bbox.contains(r)).cloned().collect(),
            fallback_text: None,
        }
    }
}

/// Concatenate runs of one line, inserting a space where there is a visible gap.
fn join_line(line: &[&TextRun]) -> String {
    let mut out = String::new();
    let mut prev: Option<&TextRun> = None;
    for run in line {
        if let Some(p) = prev {
            let gap = run.x - (p.x + p.width);
            let spaced = out.ends_with(char::is_whitespace) || run.text.starts_with(char::is_whitespace);
            if !spaced && gap > p.font_size.min(run.font_size) * 0.15 {
                out.push(' ');
            }
        }
        out.push_str(&run.text);
        prev = Some(run);
    }
    out.trim_end().to_string()
}

impl PageSource for PdfPage {
    fn text(&self) -> String {
        self.lines().join("\n")
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn crop(&self, bbox: CropBox) -> Box<dyn PageSource + '_> {
        Box::new(self.cropped(bbox))
    }
}

/// A loaded document.
#[derive(Debug, Clone, Default)]
pub struct PdfDocument {
    pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Wrap already-read pages.
    pub fn new(pages: Vec<PdfPage>) -> Self {
        Self { pages }
    }

    /// All pages in order.
    pub fn pages(&self) -> &[PdfPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whether any page has text.
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(PdfPage::has_text)
    }

    /// Text of all pages separated by blank lines.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(PageSource::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
