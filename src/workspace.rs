//! Open tabs and the active-tab pointer.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentError};

/// Stable identifier of a tab. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u64);

impl TabId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Editor cursor as reported by the frontend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

/// A document bound to an editing surface.
#[derive(Debug, Clone)]
pub struct Tab {
    id: TabId,
    document: Document,
    cursor: CursorPosition,
    scroll_top: f64,
}

impl Tab {
    pub const fn id(&self) -> TabId {
        self.id
    }

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub const fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    pub const fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn summary(&self, active: bool) -> TabSummary {
        TabSummary {
            id: self.id,
            title: self.document.display_name(),
            path: self.document.path().map(Path::to_path_buf),
            dirty: self.document.is_dirty(),
            active,
            last_saved: self.document.last_saved(),
        }
    }
}

/// What the tab strip needs to draw one tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub id: TabId,
    pub title: String,
    pub path: Option<PathBuf>,
    pub dirty: bool,
    pub active: bool,
    pub last_saved: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("no tab with id {0}")]
    UnknownTab(TabId),
    #[error("tab {0} has unsaved changes")]
    UnsavedChanges(TabId),
    #[error("{} is already open in tab {tab}", .path.display())]
    AlreadyOpen { path: PathBuf, tab: TabId },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Result of one auto-save pass.
#[derive(Debug, Default)]
pub struct AutoSaveReport {
    pub saved: Vec<(TabId, PathBuf)>,
    pub failed: Vec<(TabId, DocumentError)>,
}

impl AutoSaveReport {
    /// True when the pass touched no file.
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}

/// Ordered set of open tabs.
#[derive(Debug, Default)]
pub struct Workspace {
    tabs: Vec<Tab>,
    active: Option<TabId>,
    next_id: u64,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, document: Document) -> TabId {
        self.next_id += 1;
        let id = TabId(self.next_id);
        self.tabs.push(Tab {
            id,
            document,
            cursor: CursorPosition::default(),
            scroll_top: 0.0,
        });
        self.active = Some(id);
        id
    }

    /// Open an untitled tab holding `text` and make it active.
    pub fn new_tab(&mut self, text: impl Into<String>) -> TabId {
        self.insert(Document::untitled(text))
    }

    /// Open `path` in a new tab, or activate the tab already showing it.
    ///
    /// The flag is true when a new tab was created.
    pub fn open_path(&mut self, path: &Path) -> Result<(TabId, bool), WorkspaceError> {
        if let Some(id) = self.find_by_path(path) {
            self.active = Some(id);
            return Ok((id, false));
        }
        let document = Document::open(path)?;
        Ok((self.insert(document), true))
    }

    pub fn find_by_path(&self, path: &Path) -> Option<TabId> {
        let canonical = path.canonicalize().ok()?;
        self.tabs
            .iter()
            .find(|tab| tab.document.path() == Some(canonical.as_path()))
            .map(|tab| tab.id)
    }

    pub fn get(&self, id: TabId) -> Result<&Tab, WorkspaceError> {
        self.tabs
            .iter()
            .find(|tab| tab.id == id)
            .ok_or(WorkspaceError::UnknownTab(id))
    }

    fn get_mut(&mut self, id: TabId) -> Result<&mut Tab, WorkspaceError> {
        self.tabs
            .iter_mut()
            .find(|tab| tab.id == id)
            .ok_or(WorkspaceError::UnknownTab(id))
    }

    pub const fn active(&self) -> Option<TabId> {
        self.active
    }

    pub fn activate(&mut self, id: TabId) -> Result<(), WorkspaceError> {
        self.get(id)?;
        self.active = Some(id);
        Ok(())
    }

    /// Record the editor state of a tab. Returns the document's dirty flag.
    pub fn update(
        &mut self,
        id: TabId,
        text: impl Into<String>,
        cursor: Option<CursorPosition>,
        scroll_top: Option<f64>,
    ) -> Result<bool, WorkspaceError> {
        let tab = self.get_mut(id)?;
        if let Some(cursor) = cursor {
            tab.cursor = cursor;
        }
        if let Some(scroll_top) = scroll_top {
            tab.scroll_top = scroll_top;
        }
        Ok(tab.document.set_text(text))
    }

    /// Save a tab to its own path, returning that path.
    pub fn save(&mut self, id: TabId) -> Result<PathBuf, WorkspaceError> {
        let document = &mut self.get_mut(id)?.document;
        document.save()?;
        Ok(document.path().map(Path::to_path_buf).unwrap_or_default())
    }

    /// Save a tab under a new path. Refuses a path another tab is showing.
    pub fn save_as(&mut self, id: TabId, path: &Path) -> Result<PathBuf, WorkspaceError> {
        if let Some(tab) = self.find_by_path(path).filter(|&other| other != id) {
            return Err(WorkspaceError::AlreadyOpen {
                path: path.to_path_buf(),
                tab,
            });
        }
        let document = &mut self.get_mut(id)?.document;
        document.save_as(path)?;
        Ok(document.path().map_or_else(|| path.to_path_buf(), Path::to_path_buf))
    }

    /// Close a tab. Dirty tabs are kept unless `force` is set.
    pub fn close(&mut self, id: TabId, force: bool) -> Result<(), WorkspaceError> {
        let index = self
            .tabs
            .iter()
            .position(|tab| tab.id == id)
            .ok_or(WorkspaceError::UnknownTab(id))?;
        if self.tabs[index].document.is_dirty() && !force {
            return Err(WorkspaceError::UnsavedChanges(id));
        }
        self.tabs.remove(index);
        if self.active == Some(id) {
            self.active = self
                .tabs
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|i| self.tabs.get(i)))
                .map(|tab| tab.id);
        }
        Ok(())
    }

    /// Save every dirty tab that has a path. Clean and untitled tabs are skipped.
    pub fn auto_save(&mut self) -> AutoSaveReport {
        let mut report = AutoSaveReport::default();
        for tab in &mut self.tabs {
            let document = &mut tab.document;
            if !document.is_dirty() {
                continue;
            }
            let Some(path) = document.path().map(Path::to_path_buf) else {
                continue;
            };
            match document.save() {
                Ok(()) => report.saved.push((tab.id, path)),
                Err(err) => report.failed.push((tab.id, err)),
            }
        }
        report
    }

    pub fn tabs(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn summaries(&self) -> Vec<TabSummary> {
        self.tabs
            .iter()
            .map(|tab| tab.summary(self.active == Some(tab.id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.tabs.iter().any(|tab| tab.document.is_dirty())
    }
}
