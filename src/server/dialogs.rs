//! Native open and save pickers for the desktop window.
//!
//! The browser cannot see the local file system, so the window build asks
//! the server to show the platform dialog and returns the chosen path. Other
//! builds answer `501` and the frontend prompts for a path instead.

use std::path::PathBuf;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiJson};
use crate::export::ExportFormat;
use crate::session::Session;
use crate::workspace::TabId;

/// What a save dialog should suggest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(not(feature = "desktop"), allow(dead_code))]
pub struct SaveTarget {
    pub file_name: String,
    pub directory: Option<PathBuf>,
    pub format: Option<ExportFormat>,
}

impl SaveTarget {
    /// Suggest a name and folder for saving or exporting tab `id`.
    pub fn for_tab(
        session: &Session,
        id: TabId,
        format: Option<ExportFormat>,
    ) -> Result<Self, ApiError> {
        let workspace = session.workspace();
        let document = workspace.get(id)?.document();
        let name = document.display_name();
        Ok(Self {
            file_name: format.map_or_else(|| name.clone(), |format| format.file_name_for(&name)),
            directory: document
                .path()
                .and_then(|path| path.parent())
                .map(PathBuf::from),
            format,
        })
    }
}

#[derive(Serialize)]
pub struct Picked {
    success: bool,
    path: Option<PathBuf>,
}

impl Picked {
    const fn new(path: Option<PathBuf>) -> Self {
        Self {
            success: true,
            path,
        }
    }
}

#[derive(Serialize)]
pub struct Availability {
    success: bool,
    available: bool,
}

pub async fn availability(State(session): State<Session>) -> Json<Availability> {
    Json(Availability {
        success: true,
        available: available(&session),
    })
}

fn available(session: &Session) -> bool {
    cfg!(feature = "desktop") && session.native_dialogs()
}

fn ensure_available(session: &Session) -> Result<(), ApiError> {
    if available(session) {
        Ok(())
    } else {
        Err(ApiError::Unavailable(
            "Native file dialogs are only available in the desktop window".to_string(),
        ))
    }
}

pub async fn pick_open(State(session): State<Session>) -> Result<Json<Picked>, ApiError> {
    ensure_available(&session)?;
    let start = {
        let workspace = session.workspace();
        workspace
            .active()
            .and_then(|id| workspace.get(id).ok())
            .and_then(|tab| tab.document().path().and_then(|p| p.parent()).map(PathBuf::from))
    };
    let path = native::open_file(start).await;
    tracing::debug!(picked = ?path, "open dialog closed");
    Ok(Json(Picked::new(path)))
}

#[derive(Deserialize)]
pub struct SaveRequest {
    tab: TabId,
    #[serde(default)]
    format: Option<String>,
}

pub async fn pick_save(
    State(session): State<Session>,
    ApiJson(body): ApiJson<SaveRequest>,
) -> Result<Json<Picked>, ApiError> {
    ensure_available(&session)?;
    let format = body
        .format
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?;
    let target = SaveTarget::for_tab(&session, body.tab, format)?;
    let path = native::save_file(target).await;
    tracing::debug!(picked = ?path, "save dialog closed");
    Ok(Json(Picked::new(path)))
}

#[cfg(feature = "desktop")]
mod native {
    use std::path::PathBuf;

    use rfd::AsyncFileDialog;

    use super::SaveTarget;

    pub async fn open_file(start: Option<PathBuf>) -> Option<PathBuf> {
        let dialog = AsyncFileDialog::new()
            .set_title("Open")
            .add_filter("Markdown Files", &["md", "markdown", "txt"])
            .add_filter("All Files", &["*"]);
        let dialog = if let Some(dir) = start {
            dialog.set_directory(dir)
        } else {
            dialog
        };
        dialog.pick_file().await.map(|file| file.path().to_path_buf())
    }

    pub async fn save_file(target: SaveTarget) -> Option<PathBuf> {
        let dialog = AsyncFileDialog::new().set_file_name(&target.file_name);
        let dialog = match target.format {
            Some(format) => dialog
                .set_title("Export")
                .add_filter(format.label(), &[format.extension()]),
            None => dialog
                .set_title("Save As")
                .add_filter("Markdown Files", &["md", "markdown"]),
        };
        let dialog = if let Some(dir) = target.directory {
            dialog.set_directory(dir)
        } else {
            dialog
        };
        dialog.save_file().await.map(|file| file.path().to_path_buf())
    }
}

#[cfg(not(feature = "desktop"))]
mod native {
    use std::path::PathBuf;

    use super::SaveTarget;

    // Unreachable: `ensure_available` rejects requests first.
    pub async fn open_file(_start: Option<PathBuf>) -> Option<PathBuf> {
        None
    }

    pub async fn save_file(_target: SaveTarget) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[test]
    fn test_save_target_for_untitled_tab() {
        let session = Session::new(Config::default());
        let id = session.new_tab(None).id;

        let target = SaveTarget::for_tab(&session, id, None).unwrap();
        assert_eq!(target.file_name, "untitled.md");
        assert_eq!(target.directory, None);

        let target = SaveTarget::for_tab(&session, id, Some(ExportFormat::Pdf)).unwrap();
        assert_eq!(target.file_name, "untitled.pdf");
    }

    #[test]
    fn test_save_target_starts_next_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes").unwrap();
        let session = Session::new(Config::default());
        let id = session.open_path(&path).unwrap().id;

        let target = SaveTarget::for_tab(&session, id, Some(ExportFormat::Html)).unwrap();
        assert_eq!(target.file_name, "notes.html");
        assert_eq!(target.directory, Some(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_dialogs_are_off_unless_enabled() {
        let session = Session::new(Config::default());
        assert!(!available(&session));
        assert!(matches!(
            ensure_available(&session),
            Err(ApiError::Unavailable(_))
        ));

        let session = session.with_native_dialogs(true);
        assert_eq!(available(&session), cfg!(feature = "desktop"));
    }
}
