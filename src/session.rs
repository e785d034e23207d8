//! Shared application state behind the HTTP API and background tasks.
//!
//! Every user-visible outcome is published as an [`AppEvent`] so the
//! frontend can show it; failures become error notifications and never end
//! the session.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::export::{ExportError, ExportFormat, ExportOptions, export};
use crate::lock::write_file_locked;
use crate::workspace::{AutoSaveReport, CursorPosition, TabId, TabSummary, Workspace, WorkspaceError};

/// Buffered events per subscriber before slow subscribers start lagging.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Pushed to the frontend over `/events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppEvent {
    TabOpened { tab: TabSummary },
    TabClosed { id: TabId },
    Saved { id: TabId, path: PathBuf, auto: bool },
    Notification { level: NoticeLevel, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Rendered export of one tab.
#[derive(Debug)]
pub struct Exported {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    /// Suggested download name, e.g. `notes.html`.
    pub file_name: String,
    pub written_to: Option<PathBuf>,
}

#[derive(Clone)]
pub struct Session {
    workspace: Arc<Mutex<Workspace>>,
    config: Arc<Config>,
    events: broadcast::Sender<AppEvent>,
    native_dialogs: bool,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            workspace: Arc::new(Mutex::new(Workspace::new())),
            config: Arc::new(config),
            events,
            native_dialogs: false,
        }
    }

    /// Allow the frontend to ask for native file dialogs.
    #[must_use]
    pub fn with_native_dialogs(mut self, enabled: bool) -> Self {
        self.native_dialogs = enabled;
        self
    }

    pub const fn native_dialogs(&self) -> bool {
        self.native_dialogs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Lock the workspace. Never hold the guard across an `.await`.
    pub fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: AppEvent) {
        // No subscribers is fine: nobody is looking.
        let _ = self.events.send(event);
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.publish(AppEvent::Notification {
            level,
            message: message.into(),
        });
    }

    fn report<T, E: std::fmt::Display>(&self, action: &str, result: Result<T, E>) -> Result<T, E> {
        if let Err(err) = &result {
            tracing::warn!(%err, "{action} failed");
            self.notify(NoticeLevel::Error, format!("{action} failed: {err}"));
        }
        result
    }

    /// Open an untitled tab. `None` starts from the configured initial text.
    pub fn new_tab(&self, text: Option<String>) -> TabSummary {
        let text = text.unwrap_or_else(|| self.config.editor.initial_value.clone());
        let summary = {
            let mut workspace = self.workspace();
            let id = workspace.new_tab(text);
            summary_of(&workspace, id)
        };
        self.publish(AppEvent::TabOpened {
            tab: summary.clone(),
        });
        summary
    }

    /// Open `path` in a tab, reusing an existing tab for the same file.
    pub fn open_path(&self, path: &Path) -> Result<TabSummary, SessionError> {
        let result = {
            let mut workspace = self.workspace();
            workspace
                .open_path(path)
                .map(|(id, opened)| (summary_of(&workspace, id), opened))
        };
        let (summary, opened) = self.report("Open", result)?;
        if opened {
            tracing::info!(path = %path.display(), id = %summary.id, "opened tab");
            self.publish(AppEvent::TabOpened {
                tab: summary.clone(),
            });
        }
        Ok(summary)
    }

    /// Open every queued path, reporting failures individually.
    pub fn open_queued(&self, paths: &[PathBuf]) -> usize {
        paths
            .iter()
            .filter(|path| self.open_path(path).is_ok())
            .count()
    }

    pub fn activate(&self, id: TabId) -> Result<(), SessionError> {
        let result = self.workspace().activate(id);
        Ok(self.report("Switching tabs", result)?)
    }

    pub fn update(
        &self,
        id: TabId,
        text: String,
        cursor: Option<CursorPosition>,
        scroll_top: Option<f64>,
    ) -> Result<bool, SessionError> {
        let result = self.workspace().update(id, text, cursor, scroll_top);
        Ok(self.report("Update", result)?)
    }

    pub fn save(&self, id: TabId) -> Result<PathBuf, SessionError> {
        let result = self.workspace().save(id);
        let path = self.report("Save", result)?;
        self.publish(AppEvent::Saved {
            id,
            path: path.clone(),
            auto: false,
        });
        Ok(path)
    }

    pub fn save_as(&self, id: TabId, path: &Path) -> Result<PathBuf, SessionError> {
        let result = self.workspace().save_as(id, path);
        let path = self.report("Save", result)?;
        self.publish(AppEvent::Saved {
            id,
            path: path.clone(),
            auto: false,
        });
        Ok(path)
    }

    pub fn close(&self, id: TabId, force: bool) -> Result<(), SessionError> {
        let result = self.workspace().close(id, force);
        self.report("Close", result)?;
        self.publish(AppEvent::TabClosed { id });
        Ok(())
    }

    /// Save every dirty tab with a path. Does nothing when all tabs are clean.
    pub fn auto_save(&self) -> AutoSaveReport {
        let report = self.workspace().auto_save();
        for (id, path) in &report.saved {
            tracing::debug!(%id, path = %path.display(), "auto-saved");
            self.publish(AppEvent::Saved {
                id: *id,
                path: path.clone(),
                auto: true,
            });
        }
        for (id, err) in &report.failed {
            tracing::warn!(%id, %err, "auto-save failed");
            self.notify(NoticeLevel::Error, format!("Auto-save failed: {err}"));
        }
        report
    }

    /// Render a tab's current text, writing it to `path` when given.
    pub fn export_tab(
        &self,
        id: TabId,
        format: ExportFormat,
        path: Option<&Path>,
    ) -> Result<Exported, SessionError> {
        let (text, name) = {
            let workspace = self.workspace();
            let document = workspace.get(id)?.document();
            (document.text().to_string(), document.display_name())
        };
        let options = ExportOptions {
            theme: self.config.theme,
            fallback_title: Some(name.clone()),
        };
        let bytes = self.report("Export", export(&text, format, &options))?;

        let written_to = match path {
            Some(path) => {
                let written = write_file_locked(path, &bytes).map_err(|source| ExportError::Write {
                    path: path.to_path_buf(),
                    source,
                });
                self.report("Export", written)?;
                self.notify(
                    NoticeLevel::Info,
                    format!("Exported to {}", path.display()),
                );
                Some(path.to_path_buf())
            }
            None => None,
        };

        Ok(Exported {
            format,
            bytes,
            file_name: format.file_name_for(&name),
            written_to,
        })
    }
}

fn summary_of(workspace: &Workspace, id: TabId) -> TabSummary {
    workspace
        .get(id)
        .map(|tab| tab.summary(workspace.active() == Some(id)))
        .unwrap_or_else(|_| TabSummary {
            id,
            title: String::new(),
            path: None,
            dirty: false,
            active: false,
            last_saved: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_new_tab_uses_configured_initial_value() {
        let session = Session::new(Config::default());
        let summary = session.new_tab(None);
        let workspace = session.workspace();
        assert_eq!(
            workspace.get(summary.id).unwrap().document().text(),
            Config::default().editor.initial_value
        );
    }

    #[test]
    fn test_open_publishes_tab_opened_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "# A").unwrap();
        let session = Session::new(Config::default());
        let mut rx = session.subscribe();

        let first = session.open_path(&path).unwrap();
        let second = session.open_path(&path).unwrap();
        assert_eq!(first.id, second.id);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], AppEvent::TabOpened { tab } if tab.title == "a.md"));
    }

    #[test]
    fn test_failed_open_becomes_error_notification() {
        let dir = tempdir().unwrap();
        let session = Session::new(Config::default());
        let mut rx = session.subscribe();

        assert!(session.open_path(&dir.path().join("missing.md")).is_err());
        let events = drain(&mut rx);
        assert!(matches!(
            &events[..],
            [AppEvent::Notification { level: NoticeLevel::Error, message }] if message.contains("missing.md")
        ));
    }

    #[test]
    fn test_refused_close_and_unknown_tab_are_notified() {
        let session = Session::new(Config::default());
        let id = session.new_tab(Some(String::new())).id;
        session.update(id, "unsaved".to_string(), None, None).unwrap();
        let mut rx = session.subscribe();

        assert!(session.close(id, false).is_err());
        assert!(session.activate(TabId::new(99)).is_err());
        assert!(session.update(TabId::new(99), String::new(), None, None).is_err());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|event| matches!(
            event,
            AppEvent::Notification { level: NoticeLevel::Error, .. }
        )));
        assert_eq!(session.workspace().len(), 1);
    }

    #[test]
    fn test_auto_save_publishes_saved_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "old").unwrap();
        let session = Session::new(Config::default());
        let id = session.open_path(&path).unwrap().id;
        session.update(id, "new".to_string(), None, None).unwrap();
        let mut rx = session.subscribe();

        let report = session.auto_save();
        assert_eq!(report.saved.len(), 1);
        assert!(matches!(
            &drain(&mut rx)[..],
            [AppEvent::Saved { auto: true, .. }]
        ));
        assert!(session.auto_save().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_export_tab_to_path() {
        let dir = tempdir().unwrap();
        let session = Session::new(Config::default());
        let id = session.new_tab(Some("# Report\n\nbody".to_string())).id;
        let target = dir.path().join("report.txt");

        let exported = session
            .export_tab(id, ExportFormat::PlainText, Some(&target))
            .unwrap();
        assert_eq!(exported.file_name, "untitled.txt");
        assert_eq!(exported.written_to.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "Report\n\nbody\n");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = AppEvent::Notification {
            level: NoticeLevel::Warning,
            message: "careful".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "notification", "level": "warning", "message": "careful"})
        );
    }
}
