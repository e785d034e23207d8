//! Export a document to static formats.
//!
//! Markdown is written verbatim. HTML and plain text are produced from the
//! comrak AST, and PDF lays the plain-text rendition out on pages.

mod html;
mod pdf;
mod text;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use comrak::Options;
use serde::{Deserialize, Serialize};

use crate::config::ThemeMode;
use crate::lock::{LockError, write_file_locked};

pub use html::render_html;
pub use pdf::render_pdf;
pub use text::render_plain_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Html,
    #[serde(rename = "text")]
    PlainText,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [Self; 4] = [Self::Markdown, Self::Html, Self::PlainText, Self::Pdf];

    /// Format implied by a file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        ext.parse().ok()
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
            Self::PlainText => "txt",
            Self::Pdf => "pdf",
        }
    }

    /// Name for an export of the file called `source`, e.g. `notes.md` -> `notes.html`.
    pub fn file_name_for(self, source: &str) -> String {
        let stem = Path::new(source)
            .file_stem()
            .map_or_else(|| "document".to_string(), |s| s.to_string_lossy().into_owned());
        format!("{stem}.{}", self.extension())
    }

    /// Filter label for file dialogs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Markdown => "Markdown Files",
            Self::Html => "HTML Files",
            Self::PlainText => "Text Files",
            Self::Pdf => "PDF Files",
        }
    }

    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::PlainText => "text/plain; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Pdf => "pdf",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(Self::Markdown),
            "html" | "htm" => Ok(Self::Html),
            "txt" | "text" | "plain" => Ok(Self::PlainText),
            "pdf" => Ok(Self::Pdf),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unknown export format `{0}`")]
    UnknownFormat(String),
    #[error("cannot infer export format from {}", .0.display())]
    NoFormatForPath(PathBuf),
    #[error("failed to render {format}: {source}")]
    Render {
        format: ExportFormat,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: LockError,
    },
}

/// Presentation settings for an export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub theme: ThemeMode,
    /// Title used when the document has no heading.
    pub fallback_title: Option<String>,
}

/// Render `markdown` in `format`.
pub fn export(
    markdown: &str,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let _span = tracing::debug_span!("export", %format, bytes = markdown.len()).entered();
    let render_err = |source| ExportError::Render { format, source };
    match format {
        ExportFormat::Markdown => Ok(markdown.as_bytes().to_vec()),
        ExportFormat::Html => render_html(markdown, options)
            .map(String::into_bytes)
            .map_err(render_err),
        ExportFormat::PlainText => Ok(render_plain_text(markdown).into_bytes()),
        ExportFormat::Pdf => Ok(render_pdf(&render_plain_text(markdown))),
    }
}

/// Export to `path`, inferring the format from its extension when not given.
pub fn export_to_path(
    markdown: &str,
    path: &Path,
    format: Option<ExportFormat>,
    options: &ExportOptions,
) -> Result<ExportFormat, ExportError> {
    let format = format
        .or_else(|| ExportFormat::from_path(path))
        .ok_or_else(|| ExportError::NoFormatForPath(path.to_path_buf()))?;
    let bytes = export(markdown, format, options)?;
    write_file_locked(path, &bytes).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), %format, bytes = bytes.len(), "exported document");
    Ok(format)
}

fn enable_extensions(options: &mut Options) {
    // Enable GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.superscript = true;

    options.extension.header_ids = Some(String::new());
    options.extension.description_lists = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "# Notes\n\nSome *text* here.\n\n```rust\nfn main() {}\n```\n";

    #[test]
    fn test_format_from_name_and_extension() {
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::PlainText);
        assert!("docx".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("out/Report.PDF")),
            Some(ExportFormat::Pdf)
        );
        assert_eq!(ExportFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_extension_round_trips_through_from_path() {
        for format in ExportFormat::ALL {
            let path = PathBuf::from(format!("doc.{}", format.extension()));
            assert_eq!(ExportFormat::from_path(&path), Some(format));
        }
    }

    #[test]
    fn test_export_file_name_swaps_extension() {
        assert_eq!(ExportFormat::Html.file_name_for("notes.md"), "notes.html");
        assert_eq!(ExportFormat::Pdf.file_name_for("report.v2.md"), "report.v2.pdf");
        assert_eq!(ExportFormat::PlainText.file_name_for(""), "document.txt");
    }

    #[test]
    fn test_markdown_export_is_verbatim() {
        let bytes = export(SAMPLE, ExportFormat::Markdown, &ExportOptions::default()).unwrap();
        assert_eq!(bytes, SAMPLE.as_bytes());
    }

    #[test]
    fn test_every_rendered_format_is_non_empty() {
        for format in [ExportFormat::Html, ExportFormat::PlainText, ExportFormat::Pdf] {
            let bytes = export(SAMPLE, format, &ExportOptions::default()).unwrap();
            assert!(!bytes.is_empty(), "{format} export was empty");
        }
    }

    #[test]
    fn test_export_to_path_infers_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.html");
        let format = export_to_path(SAMPLE, &path, None, &ExportOptions::default()).unwrap();

        assert_eq!(format, ExportFormat::Html);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
        assert!(written.contains("<em>text</em>"));
    }

    #[test]
    fn test_export_to_path_without_extension_needs_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes");
        assert!(matches!(
            export_to_path(SAMPLE, &path, None, &ExportOptions::default()),
            Err(ExportError::NoFormatForPath(_))
        ));
        export_to_path(
            SAMPLE,
            &path,
            Some(ExportFormat::PlainText),
            &ExportOptions::default(),
        )
        .unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Some text here."));
    }
}
