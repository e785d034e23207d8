//! Open markdown documents and their save state.
//!
//! A [`Document`] owns the editor's current text for one file. Writes go
//! through [`crate::lock::write_file_locked`] so a save fails instead of
//! interleaving with another instance writing the same file.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::lock::{LockError, write_file_locked};

/// Name shown for documents that have never been saved.
pub const UNTITLED_NAME: &str = "untitled.md";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid UTF-8 text", .0.display())]
    NotUtf8(PathBuf),
    #[error("document has no file path yet; use save as")]
    Untitled,
    #[error("{} is being written by another process", .0.display())]
    Locked(PathBuf),
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// In-memory text of one markdown file.
#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    text: String,
    /// Text last read from or written to disk.
    baseline: String,
    dirty: bool,
    last_saved: Option<DateTime<Utc>>,
}

impl Document {
    /// Read `path` into a clean document.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                DocumentError::NotFound(path.to_path_buf())
            } else {
                DocumentError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let text = String::from_utf8(bytes).map_err(|_| DocumentError::NotUtf8(path.to_path_buf()))?;
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        tracing::debug!(path = %path.display(), bytes = text.len(), "opened document");

        Ok(Self {
            path: Some(path),
            baseline: text.clone(),
            text,
            dirty: false,
            last_saved: None,
        })
    }

    /// A document with no backing file.
    pub fn untitled(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: None,
            baseline: text.clone(),
            text,
            dirty: false,
            last_saved: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the text differs from what was last loaded or saved.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn file_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn display_name(&self) -> String {
        self.file_name().unwrap_or_else(|| UNTITLED_NAME.to_string())
    }

    /// Replace the text with the editor's contents. Returns the new dirty state.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        self.text = text.into();
        self.dirty = self.text != self.baseline;
        self.dirty
    }

    /// Write the current text back to the document's path.
    pub fn save(&mut self) -> Result<(), DocumentError> {
        let path = self.path.clone().ok_or(DocumentError::Untitled)?;
        self.write_to(&path)
    }

    /// Write the current text to `path` and adopt it as the document's path.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        self.write_to(path)?;
        self.path = Some(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));
        Ok(())
    }

    fn write_to(&mut self, path: &Path) -> Result<(), DocumentError> {
        write_file_locked(path, self.text.as_bytes()).map_err(|err| match err {
            LockError::Locked | LockError::Timeout(_) => DocumentError::Locked(path.to_path_buf()),
            LockError::Io(source) => DocumentError::Write {
                path: path.to_path_buf(),
                source,
            },
        })?;
        self.baseline.clone_from(&self.text);
        self.dirty = false;
        self.last_saved = Some(Utc::now());
        tracing::debug!(path = %path.display(), bytes = self.text.len(), "saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_reads_file_bytes_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.md");
        let body = "# Title\r\n\r\nTrailing spaces  \n\u{1F600}\n";
        std::fs::write(&path, body).unwrap();

        let doc = Document::open(&path).unwrap();
        assert_eq!(doc.text(), body);
        assert!(!doc.is_dirty());
        assert_eq!(doc.file_name().as_deref(), Some("note.md"));
    }

    #[test]
    fn test_open_missing_file_reports_not_found() {
        let dir = tempdir().unwrap();
        let err = Document::open(dir.path().join("nope.md")).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[test]
    fn test_open_binary_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.md");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(matches!(
            Document::open(&path),
            Err(DocumentError::NotUtf8(_))
        ));
    }

    #[test]
    fn test_edit_marks_dirty_and_undo_clears_it() {
        let mut doc = Document::untitled("hello");
        assert!(doc.set_text("hello world"));
        assert!(!doc.set_text("hello"));
        assert!(doc.set_text("hellO"), "same-length edits are changes");
    }

    #[test]
    fn test_saved_text_becomes_the_clean_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "first").unwrap();
        let mut doc = Document::open(&path).unwrap();

        doc.set_text("second");
        doc.save().unwrap();
        assert!(!doc.set_text("second"));
        assert!(doc.set_text("first"), "the pre-save text is now a change");
    }

    #[test]
    fn test_save_writes_current_text_to_origin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "old").unwrap();

        let mut doc = Document::open(&path).unwrap();
        doc.set_text("new body\n");
        doc.save().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new body\n");
        assert!(!doc.is_dirty());
        assert!(doc.last_saved().is_some());
    }

    #[test]
    fn test_save_untitled_requires_path() {
        let mut doc = Document::untitled("draft");
        assert!(matches!(doc.save(), Err(DocumentError::Untitled)));
        assert_eq!(doc.display_name(), UNTITLED_NAME);
    }

    #[test]
    fn test_save_as_rebinds_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.md");
        let mut doc = Document::untitled("");
        doc.set_text("draft");

        doc.save_as(&path).unwrap();
        assert_eq!(doc.display_name(), "fresh.md");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "draft");

        doc.set_text("draft 2");
        doc.save().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "draft 2");
    }

    #[test]
    fn test_save_fails_while_file_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "old").unwrap();
        let mut doc = Document::open(&path).unwrap();
        doc.set_text("new");

        let holder = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        crate::lock::try_lock_file(&holder).unwrap();

        assert!(matches!(doc.save(), Err(DocumentError::Locked(_))));
        assert!(doc.is_dirty(), "failed save must keep changes pending");
    }

    proptest! {
        #[test]
        fn prop_dirty_tracks_difference_from_baseline(
            initial in "[ab\\n]{0,8}",
            edits in proptest::collection::vec("[ab\\n]{0,8}", 1..8),
        ) {
            let mut doc = Document::untitled(initial.clone());
            for edit in &edits {
                let dirty = doc.set_text(edit.clone());
                prop_assert_eq!(dirty, *edit != initial);
            }
        }
    }
}
