//! Debounced change detection for the opening queue.
//!
//! The queue file is created by whichever process writes first, so the
//! watch is placed on its directory and events are filtered by file name.
mod queue;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

pub use queue::{QUEUE_POLL_INTERVAL, spawn_queue_watcher};

/// Watches one file, which need not exist yet, and reports debounced changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    dir: PathBuf,
    target: PathBuf,
    name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl FileWatcher {
    /// Watch `path` through its parent directory.
    ///
    /// # Errors
    /// Fails when the parent directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        let path = path.as_ref();
        let name = path.file_name().map(OsString::from);
        // Event paths are canonical, so canonicalize the directory, not the
        // file (which may be missing).
        let dir = parent_dir(path);
        let dir = dir.canonicalize().unwrap_or(dir);
        let target = name.as_ref().map_or_else(|| dir.clone(), |name| dir.join(name));

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %target.display(), "watching file");

        Ok(Self {
            _watcher: watcher,
            rx,
            dir,
            target,
            name,
            debounce,
            pending_since: None,
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// True once per burst of changes, after `debounce` has passed since
    /// the most recent relevant event.
    pub fn take_change_ready(&mut self) -> bool {
        let mut relevant = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(event) if self.is_relevant(&event) => relevant += 1,
                Ok(event) => {
                    tracing::trace!(kind = ?event.kind, paths = ?event.paths, "ignored fs event");
                }
                Err(err) => tracing::warn!(%err, "file watcher error"),
            }
        }
        if relevant > 0 {
            tracing::trace!(relevant, path = %self.target.display(), "fs events");
            self.pending_since = Some(Instant::now());
        }

        match self.pending_since {
            Some(since) if since.elapsed() >= self.debounce => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.dir
                || path == &self.target
                || self
                    .name
                    .as_ref()
                    .is_some_and(|name| path.file_name() == Some(name.as_os_str()))
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
