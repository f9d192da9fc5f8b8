//! Content-stream interpreter producing positioned text runs.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace, warn};

use super::fonts::{number, FontInfo};
use super::{PageSource, PdfDocument, PdfPage, Result, TextRun};
use crate::error::PdfError;

/// A4 portrait, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 595.0, 842.0];

/// Nested form XObjects are followed up to this depth.
const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments more negative than this (in 1/1000 em) read as a space.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translate(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// Reads PDF files into [`PdfDocument`]s.
#[derive(Debug, Clone, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a new reader.
    pub fn new() -> Self {
        Self
    }

    /// Read a PDF from disk.
    pub fn read_file(&self, path: &Path) -> Result<PdfDocument> {
        let data = std::fs::read(path).map_err(|e| PdfError::Parse(format!("{}: {}", path.display(), e)))?;
        self.read_bytes(&data)
    }

    /// Read a PDF from memory.
    pub fn read_bytes(&self, data: &[u8]) -> Result<PdfDocument> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Owner-password-only files open with an empty user password
        let mut raw = data.to_vec();
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
            raw.clear();
            doc.save_to(&mut raw)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
        }

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(PdfError::NoPages);
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (&page_no, &page_id) in page_ids.iter() {
            let [x0, y0, x1, y1] = media_box(&doc, page_id);
            let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());

            let runs = match page_runs(&doc, page_id, x0, y1) {
                Ok(runs) => runs,
                Err(e) => {
                    warn!("Page {}: could not interpret content stream: {}", page_no, e);
                    Vec::new()
                }
            };
            trace!("Page {}: {} text runs, {}x{} pt", page_no, runs.len(), width, height);
            pages.push(PdfPage::from_runs(page_no, width, height, runs));
        }

        let document = PdfDocument::new(pages);
        if document.has_text() {
            debug!("Loaded PDF with {} pages", document.page_count());
            return Ok(document);
        }

        // No positioned text: fall back to plain extraction
        // An image-only scan is not a read error; extraction reports it
        let text = match pdf_extract::extract_text_from_mem(&raw) {
            Ok(text) => text,
            Err(e) => {
                warn!("Plain text extraction failed: {}", e);
                String::new()
            }
        };
        debug!("No positioned text, falling back to plain extraction ({} chars)", text.len());

        let pages = document
            .pages()
            .iter()
            .map(|p| {
                let body = if p.number == 1 { text.clone() } else { String::new() };
                PdfPage::from_text(p.number, p.width(), p.height(), body)
            })
            .collect();
        Ok(PdfDocument::new(pages))
    }
}

/// Look up a page attribute, following the Parent chain for inheritable keys.
fn inherited<'a>(doc: &'a Document, node_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = node_id;
    for _ in 0..32 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| {
            let values: Vec<f64> = arr
                .iter()
                .filter_map(|o| doc.dereference(o).ok().and_then(|(_, o)| number(o)))
                .collect();
            match values.as_slice() {
                &[a, b, c, d] => Some([a.min(c), b.min(d), a.max(c), b.max(d)]),
                _ => None,
            }
        })
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

fn page_runs(doc: &Document, page_id: ObjectId, origin_x: f64, page_top: f64) -> Result<Vec<TextRun>> {
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
    let resources = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok());

    let mut interpreter = Interpreter::new(doc, origin_x, page_top);
    interpreter.run(&content, resources, IDENTITY, 0)?;
    Ok(interpreter.runs)
}

#[derive(Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    origin_x: f64,
    page_top: f64,
    fonts: HashMap<(usize, Vec<u8>), FontInfo>,
    runs: Vec<TextRun>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, origin_x: f64, page_top: f64) -> Self {
        Self {
            doc,
            origin_x,
            page_top,
            fonts: HashMap::new(),
            runs: Vec::new(),
        }
    }

    fn font(&mut self, resources: Option<&Dictionary>, name: &[u8]) -> FontInfo {
        // Keyed by resource dictionary address: form XObjects carry their own
        let key = (resources.map(|r| r as *const Dictionary as usize).unwrap_or(0), name.to_vec());
        if let Some(info) = self.fonts.get(&key) {
            return info.clone();
        }
        let doc = self.doc;
        let info = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|f| doc.dereference(f).ok())
            .and_then(|(_, f)| f.as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|f| doc.dereference(f).ok())
            .and_then(|(_, f)| f.as_dict().ok())
            .map(|dict| FontInfo::from_dict(doc, dict))
            .unwrap_or_default();
        self.fonts.insert(key, info.clone());
        info
    }

    fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) -> Result<()> {
        let content = Content::decode(content).map_err(|e| PdfError::TextExtraction(e.to_string()))?;

        let mut ctm = ctm;
        let mut state = TextState::default();
        let mut stack: Vec<(Matrix, TextState)> = Vec::new();
        let mut tm = IDENTITY;
        let mut tlm = IDENTITY;

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number).unwrap_or(0.0);

            match op.operator.as_str() {
                "q" => stack.push((ctm, state.clone())),
                "Q" => {
                    if let Some((saved_ctm, saved_state)) = stack.pop() {
                        ctm = saved_ctm;
                        state = saved_state;
                    }
                }
                "cm" => ctm = multiply(&[num(0), num(1), num(2), num(3), num(4), num(5)], &ctm),
                "BT" => {
                    tm = IDENTITY;
                    tlm = IDENTITY;
                }
                "Tf" => {
                    state.font = operands.first().and_then(|o| o.as_name().ok()).map(|n| n.to_vec());
                    state.size = num(1);
                }
                "Tc" => state.char_spacing = num(0),
                "Tw" => state.word_spacing = num(0),
                "Tz" => state.horizontal_scale = num(0) / 100.0,
                "TL" => state.leading = num(0),
                "Ts" => state.rise = num(0),
                "Td" => {
                    tlm = multiply(&translate(num(0), num(1)), &tlm);
                    tm = tlm;
                }
                "TD" => {
                    state.leading = -num(1);
                    tlm = multiply(&translate(num(0), num(1)), &tlm);
                    tm = tlm;
                }
                "Tm" => {
                    tlm = [num(0), num(1), num(2), num(3), num(4), num(5)];
                    tm = tlm;
                }
                "T*" => {
                    tlm = multiply(&translate(0.0, -state.leading), &tlm);
                    tm = tlm;
                }
                "Tj" | "'" | "\"" => {
                    if op.operator == "\"" {
                        state.word_spacing = num(0);
                        state.char_spacing = num(1);
                    }
                    if op.operator != "Tj" {
                        tlm = multiply(&translate(0.0, -state.leading), &tlm);
                        tm = tlm;
                    }
                    let string = operands.last().and_then(|o| o.as_str().ok());
                    if let Some(bytes) = string {
                        let font = self.current_font(resources, &state);
                        let mut run = RunBuilder::start(&tm, &ctm, &state);
                        tm = run.show(&font, bytes, &state, tm);
                        self.finish(run, &tm, &ctm);
                    }
                }
                "TJ" => {
                    let Some(items) = operands.first().and_then(|o| o.as_array().ok()) else {
                        continue;
                    };
                    let font = self.current_font(resources, &state);
                    let mut run = RunBuilder::start(&tm, &ctm, &state);
                    for item in items {
                        match item {
                            Object::String(bytes, _) => tm = run.show(&font, bytes, &state, tm),
                            other => {
                                let adjust = number(other).unwrap_or(0.0);
                                let tx = -adjust / 1000.0 * state.size * state.horizontal_scale;
                                tm = multiply(&translate(tx, 0.0), &tm);
                                if adjust < TJ_SPACE_THRESHOLD && !run.text.ends_with(' ') {
                                    run.text.push(' ');
                                }
                            }
                        }
                    }
                    self.finish(run, &tm, &ctm);
                }
                "Do" if depth < MAX_FORM_DEPTH => {
                    let name = operands.first().and_then(|o| o.as_name().ok());
                    if let Some((form, form_resources, matrix)) = name.and_then(|n| self.form_xobject(resources, n)) {
                        let data = match form.decompressed_content() {
                            Ok(d) => d,
                            Err(_) => form.content.clone(),
                        };
                        let form_ctm = multiply(&matrix, &ctm);
                        if let Err(e) = self.run(&data, form_resources.or(resources), form_ctm, depth + 1) {
                            trace!("Skipping unreadable form XObject: {}", e);
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn current_font(&mut self, resources: Option<&Dictionary>, state: &TextState) -> FontInfo {
        match &state.font {
            Some(name) => self.font(resources, name),
            None => FontInfo::default(),
        }
    }

    #[allow(clippy::type_complexity)]
    fn form_xobject(
        &self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
    ) -> Option<(&'a lopdf::Stream, Option<&'a Dictionary>, Matrix)> {
        let doc = self.doc;
        let xobjects = resources?.get(b"XObject").ok()?;
        let (_, xobjects) = doc.dereference(xobjects).ok()?;
        let entry = xobjects.as_dict().ok()?.get(name).ok()?;
        let (_, obj) = doc.dereference(entry).ok()?;
        let Object::Stream(stream) = obj else {
            return None;
        };
        if stream.dict.get(b"Subtype").ok()?.as_name().ok()? != b"Form" {
            return None;
        }

        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, r)| r.as_dict().ok());

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| m.as_array().ok())
            .map(|arr| arr.iter().filter_map(number).collect::<Vec<_>>())
            .and_then(|v| <[f64; 6]>::try_from(v.as_slice()).ok())
            .unwrap_or(IDENTITY);

        Some((stream, form_resources, matrix))
    }

    fn finish(&mut self, run: RunBuilder, tm: &Matrix, ctm: &Matrix) {
        if run.text.trim().is_empty() {
            return;
        }
        let end = multiply(tm, ctm);
        self.runs.push(TextRun {
            text: run.text,
            x: run.x - self.origin_x,
            top: self.page_top - run.y,
            width: (end[4] - run.x).abs(),
            font_size: run.font_size,
        });
    }
}

/// Text accumulated from one show operator.
struct RunBuilder {
    text: String,
    x: f64,
    y: f64,
    font_size: f64,
}

impl RunBuilder {
    fn start(tm: &Matrix, ctm: &Matrix, state: &TextState) -> Self {
        let trm = multiply(&multiply(&translate(0.0, state.rise), tm), ctm);
        Self {
            text: String::new(),
            x: trm[4],
            y: trm[5],
            font_size: (state.size * trm[2].hypot(trm[3])).abs(),
        }
    }

    /// Append glyphs and return the advanced text matrix.
    fn show(&mut self, font: &FontInfo, bytes: &[u8], state: &TextState, tm: Matrix) -> Matrix {
        let mut advance = 0.0;
        for glyph in font.decode(bytes) {
            let mut tx = glyph.width / 1000.0 * state.size + state.char_spacing;
            if glyph.is_space {
                tx += state.word_spacing;
            }
            advance += tx * state.horizontal_scale;
            self.text.push_str(&glyph.text);
        }
        multiply(&translate(advance, 0.0), &tm)
    }
}
