//! Minimal PDF writer for text documents.
//!
//! Produces PDF 1.4 with one standard Type 1 font (Helvetica, WinAnsi
//! encoding), so no font data is embedded. Text is wrapped and paginated
//! on US-Letter pages.

use std::io::Write;

/// Text lines per page.
pub const LINES_PER_PAGE: usize = 54;
/// Wrap width in characters.
pub const WRAP_COLUMNS: usize = 90;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: u32 = 72;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 12;

// Object numbers of the fixed objects; pages follow as (page, contents) pairs.
const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const FONT_ID: usize = 3;
const FIRST_PAGE_ID: usize = 4;

/// Lay `text` out as a PDF document. Always yields at least one page.
pub fn render_pdf(text: &str) -> Vec<u8> {
    let lines = layout_lines(text);
    let pages: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut pdf = PdfWriter::new();
    pdf.object(
        CATALOG_ID,
        format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>").as_bytes(),
    );
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", FIRST_PAGE_ID + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    pdf.object(
        PAGES_ID,
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()).as_bytes(),
    );
    pdf.object(
        FONT_ID,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );

    for (index, page_lines) in pages.iter().enumerate() {
        let page_id = FIRST_PAGE_ID + 2 * index;
        let contents_id = page_id + 1;
        pdf.object(
            page_id,
            format!(
                "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 {FONT_ID} 0 R >> >> /Contents {contents_id} 0 R >>"
            )
            .as_bytes(),
        );
        let stream = content_stream(page_lines);
        let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        body.extend_from_slice(&stream);
        body.extend_from_slice(b"\nendstream");
        pdf.object(contents_id, &body);
    }

    pdf.finish(CATALOG_ID)
}

fn layout_lines(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            let expanded = line.replace('\t', "    ");
            textwrap::wrap(&expanded, WRAP_COLUMNS)
                .into_iter()
                .map(|part| part.into_owned())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn content_stream(lines: &[String]) -> Vec<u8> {
    let top = PAGE_HEIGHT - MARGIN - FONT_SIZE;
    let mut stream = format!("BT\n/F1 {FONT_SIZE} Tf\n{LEADING} TL\n{MARGIN} {top} Td\n").into_bytes();
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            stream.extend_from_slice(b"T*\n");
        }
        stream.push(b'(');
        stream.extend_from_slice(&escape_pdf_string(line));
        stream.extend_from_slice(b") Tj\n");
    }
    stream.extend_from_slice(b"ET");
    stream
}

/// Encode `text` as the body of a PDF literal string.
///
/// Characters outside Latin-1 and control characters become `?`.
pub fn escape_pdf_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            c if c < ' ' => out.push(b'?'),
            c => out.push(u8::try_from(u32::from(c)).unwrap_or(b'?')),
        }
    }
    out
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    /// Append object `id`. Objects must be written in id order.
    fn object(&mut self, id: usize, body: &[u8]) {
        debug_assert_eq!(id, self.offsets.len() + 1, "pdf objects out of order");
        self.offsets.push(self.buf.len());
        let _ = writeln!(self.buf, "{id} 0 obj");
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let size = self.offsets.len() + 1;
        let _ = write!(self.buf, "xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            let _ = writeln!(self.buf, "{offset:010} 00000 n ");
        }
        let _ = writeln!(
            self.buf,
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_offset}\n%%EOF"
        );
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn as_text(pdf: &[u8]) -> String {
        String::from_utf8_lossy(pdf).into_owned()
    }

    fn page_count(pdf: &[u8]) -> usize {
        as_text(pdf).matches("/Type /Page ").count()
    }

    #[test]
    fn test_document_framing() {
        let pdf = render_pdf("hello");
        assert!(pdf.starts_with(b"%PDF-1.4\n"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert!(as_text(&pdf).contains("(hello) Tj"));
    }

    #[test]
    fn test_empty_text_still_has_a_page() {
        let pdf = render_pdf("");
        assert_eq!(page_count(&pdf), 1);
        assert!(as_text(&pdf).contains("/Count 1"));
    }

    #[test]
    fn test_long_text_paginates() {
        let text = (0..(LINES_PER_PAGE * 2 + 1))
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let pdf = render_pdf(&text);
        assert_eq!(page_count(&pdf), 3);
        assert!(as_text(&pdf).contains("/Count 3"));
    }

    #[test]
    fn test_long_lines_wrap() {
        let line = "word ".repeat(40);
        let lines = layout_lines(&line);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= WRAP_COLUMNS));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = render_pdf("a\nb\nc");
        let xref_start = pdf.windows(6).position(|w| w == b"\nxref\n").unwrap() + 1;
        let table = std::str::from_utf8(&pdf[xref_start..]).unwrap();
        let entries = table
            .lines()
            .skip(3)
            .take_while(|line| line.ends_with(" n "));
        let mut count = 0;
        for (index, entry) in entries.enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            let expected = format!("{} 0 obj", index + 1);
            assert!(pdf[offset..].starts_with(expected.as_bytes()), "bad offset for {expected}");
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_escape_special_and_non_latin_characters() {
        assert_eq!(escape_pdf_string("a (b) \\"), b"a \\(b\\) \\\\".to_vec());
        assert_eq!(escape_pdf_string("caf\u{e9} \u{2603}"), b"caf\xe9 ?".to_vec());
    }

    proptest! {
        #[test]
        fn prop_escaped_string_has_no_bare_parentheses(text in "\\PC{0,40}") {
            let escaped = escape_pdf_string(&text);
            let mut escaping = false;
            for byte in escaped {
                if escaping {
                    escaping = false;
                    continue;
                }
                match byte {
                    b'\\' => escaping = true,
                    b'(' | b')' => prop_assert!(false, "bare parenthesis in {:?}", text),
                    _ => {}
                }
            }
            prop_assert!(!escaping, "dangling escape in {:?}", text);
        }
    }
}
