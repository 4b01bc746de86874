//! Minimal PDF 1.4 writer for text-only statements.
//!
//! Output is a function of the statement and layout alone: no creation dates,
//! no document ids. The same statement always encodes to the same bytes.

use std::fmt::Write as _;

use thiserror::Error;

use crate::statement::Statement;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("page {page} holds {lines} lines but the layout fits {max}")]
    PageOverflow { page: usize, lines: usize, max: usize },
}

/// Page geometry in PDF points (1/72 inch), origin at the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub header_x: f32,
    pub header_y: f32,
    pub line_x: f32,
    pub first_line_y: f32,
    pub line_step: f32,
    /// Lines are never drawn below this.
    pub bottom_margin: f32,
}

impl Default for PageLayout {
    /// A4 portrait, Helvetica 12pt.
    fn default() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
            font_size: 12.0,
            header_x: 200.0,
            header_y: 800.0,
            line_x: 100.0,
            first_line_y: 760.0,
            line_step: 20.0,
            bottom_margin: 50.0,
        }
    }
}

impl PageLayout {
    /// Most transaction lines that fit between the first line and the margin.
    pub fn max_lines(&self) -> usize {
        if self.line_step <= 0.0 || self.first_line_y < self.bottom_margin {
            return 0;
        }
        ((self.first_line_y - self.bottom_margin) / self.line_step).floor() as usize + 1
    }

    fn line_y(&self, index: usize) -> f32 {
        self.first_line_y - self.line_step * index as f32
    }
}

pub const CONTENT_TYPE: &str = "application/pdf";

const CATALOG: usize = 1;
const PAGES: usize = 2;
const FONT: usize = 3;
const INFO: usize = 4;
const FIRST_PAGE: usize = 5;

/// Encode `statement` as a complete PDF document.
///
/// Fails if any page has more lines than `layout` can draw above its margin.
pub fn encode_pdf(statement: &Statement, layout: &PageLayout) -> Result<Vec<u8>, EncodeError> {
    let max = layout.max_lines();
    if let Some((page, lines)) = statement
        .pages
        .iter()
        .map(|p| p.lines.len())
        .enumerate()
        .find(|&(_, lines)| lines > max)
    {
        return Err(EncodeError::PageOverflow {
            page: page + 1,
            lines,
            max,
        });
    }

    let mut writer = PdfWriter::new();

    let page_ids: Vec<usize> = (0..statement.pages.len())
        .map(|i| FIRST_PAGE + 2 * i)
        .collect();

    writer.object(CATALOG, &format!("<< /Type /Catalog /Pages {PAGES} 0 R >>"));

    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    writer.object(
        PAGES,
        &format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", page_ids.len()),
    );

    writer.object(
        FONT,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );

    let title = statement.header().unwrap_or("Statement");
    writer.object(
        INFO,
        &format!("<< /Title ({}) /Producer (passbook) >>", escape_text(title)),
    );

    for (page, &page_id) in statement.pages.iter().zip(&page_ids) {
        let content_id = page_id + 1;
        writer.object(
            page_id,
            &format!(
                "<< /Type /Page /Parent {PAGES} 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 {FONT} 0 R >> >> /Contents {content_id} 0 R >>",
                num(layout.width),
                num(layout.height)
            ),
        );

        let mut content = String::new();
        if let Some(header) = &page.header {
            push_text(&mut content, layout, layout.header_x, layout.header_y, header);
        }
        for (i, line) in page.lines.iter().enumerate() {
            push_text(&mut content, layout, layout.line_x, layout.line_y(i), line);
        }
        writer.stream(content_id, content.as_bytes());
    }

    Ok(writer.finish(FIRST_PAGE + 2 * page_ids.len() - 1))
}

fn push_text(content: &mut String, layout: &PageLayout, x: f32, y: f32, text: &str) {
    let _ = writeln!(
        content,
        "BT /F1 {} Tf {} {} Td ({}) Tj ET",
        num(layout.font_size),
        num(x),
        num(y),
        escape_text(text)
    );
}

/// Shortest decimal form; PDF has no exponent notation.
fn num(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Escape `text` for a PDF literal string in WinAnsi encoding.
///
/// Latin-1 characters are written as octal escapes; anything outside it
/// becomes `?`.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(ch),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", ch as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn begin(&mut self, id: usize) {
        self.offsets.push((id, self.buf.len()));
        self.buf.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    }

    fn object(&mut self, id: usize, body: &str) {
        self.begin(id);
        self.buf.extend_from_slice(body.as_bytes());
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, id: usize, data: &[u8]) {
        self.begin(id);
        self.buf
            .extend_from_slice(format!("<< /Length {} >>\nstream\n", data.len()).as_bytes());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self, max_id: usize) -> Vec<u8> {
        self.offsets.sort_by_key(|(id, _)| *id);

        let xref_at = self.buf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", max_id + 1);
        for (_, offset) in &self.offsets {
            let _ = write!(xref, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root {CATALOG} 0 R /Info {INFO} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            max_id + 1
        );
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}
