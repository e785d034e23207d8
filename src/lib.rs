// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. export::ExportFormat)
    clippy::module_name_repetitions
)]

//! # MarkFlow
//!
//! A desktop markdown note-taking application.
//!
//! MarkFlow runs a small local web server that hosts a browser-based
//! markdown editor, shown in a native window (or the default browser):
//! - Multi-tab editing with dirty tracking
//! - Auto-save on a timer
//! - Export to Markdown, HTML, plain text and PDF
//! - One running instance; later invocations hand their file over
//!
//! ## Architecture
//!
//! All state lives in a [`session::Session`]: the open tabs, the read-only
//! configuration and an event channel. The HTTP API, the auto-save timer and
//! the opening-queue watcher all act on the session; the frontend listens for
//! its events over server-sent events.
//!
//! ## Modules
//!
//! - [`config`]: Layered YAML settings
//! - [`document`]: One file's text and save state
//! - [`workspace`]: Open tabs
//! - [`session`]: Shared state and events
//! - [`autosave`]: Periodic saving
//! - [`export`]: HTML, plain text and PDF output
//! - [`highlight`]: Code block highlighting
//! - [`lock`]: Advisory file locks
//! - [`instance`]: Single-instance handshake
//! - [`watcher`]: Opening-queue watching
//! - [`server`]: HTTP API and embedded frontend
//! - [`shell`]: Native window or browser

pub mod autosave;
pub mod config;
pub mod document;
pub mod export;
pub mod highlight;
pub mod instance;
pub mod lock;
pub mod server;
pub mod session;
pub mod shell;
pub mod watcher;
pub mod workspace;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ThemeMode};
    pub use crate::document::Document;
    pub use crate::export::{ExportFormat, ExportOptions};
    pub use crate::session::{AppEvent, Session};
    pub use crate::workspace::{TabId, Workspace};
}
