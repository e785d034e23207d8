//! Single-instance coordination.
//!
//! The first process holds an exclusive lock on `server.lock` in the runtime
//! directory for as long as it serves, and publishes its URL in
//! `server.url`. Later invocations find the lock taken and either hand their
//! file to the running instance through the opening queue or open a window
//! on the published URL.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::lock::{LockError, lock_with_timeout, try_lock_file, write_file_locked};

pub const SERVER_LOCK_FILE: &str = "server.lock";
pub const SERVER_URL_FILE: &str = "server.url";
pub const OPENING_QUEUE_FILE: &str = "opening.txt";
pub const OPENING_LOCK_FILE: &str = "opening.txt.lock";

/// How long a secondary invocation waits for the queue lock.
pub const QUEUE_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("failed to create runtime directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: LockError,
    },
}

impl InstanceError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn lock(path: &Path) -> impl FnOnce(LockError) -> Self + '_ {
        move |source| Self::Lock {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Default location of the lock, URL and queue files.
pub fn runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map_or_else(std::env::temp_dir, PathBuf::from)
        .join("markflow")
}

/// Outcome of trying to become the serving instance.
#[derive(Debug)]
pub enum Acquisition {
    Acquired(InstanceLock),
    /// Another process holds the lock. `url` is `None` until it has published one.
    AlreadyRunning { url: Option<String> },
}

/// Held by the serving instance. Dropping it releases the lock and retracts
/// the published URL.
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
    dir: PathBuf,
    published: bool,
}

impl InstanceLock {
    pub fn acquire(dir: &Path) -> Result<Acquisition, InstanceError> {
        fs::create_dir_all(dir).map_err(|source| InstanceError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(SERVER_LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(InstanceError::io(&path))?;

        match try_lock_file(&file) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired instance lock");
                Ok(Acquisition::Acquired(Self {
                    _file: file,
                    dir: dir.to_path_buf(),
                    published: false,
                }))
            }
            Err(LockError::Locked) => Ok(Acquisition::AlreadyRunning {
                url: read_published_url(dir),
            }),
            Err(err) => Err(InstanceError::lock(&path)(err)),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.dir
    }

    /// Advertise the server URL to later invocations.
    pub fn publish_url(&mut self, url: &str) -> Result<(), InstanceError> {
        let path = self.dir.join(SERVER_URL_FILE);
        write_file_locked(&path, format!("{url}\n").as_bytes())
            .map_err(InstanceError::lock(&path))?;
        self.published = true;
        tracing::debug!(%url, path = %path.display(), "published server url");
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if self.published {
            let _ = fs::remove_file(self.dir.join(SERVER_URL_FILE));
        }
    }
}

/// URL published by the running instance, if any.
pub fn read_published_url(dir: &Path) -> Option<String> {
    let url = fs::read_to_string(dir.join(SERVER_URL_FILE)).ok()?;
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Poll for a published URL, for when the running instance is still starting.
pub fn wait_for_published_url(dir: &Path, timeout: Duration) -> Option<String> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(url) = read_published_url(dir) {
            return Some(url);
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(URL_POLL_INTERVAL);
    }
}

/// `opening.txt`: one absolute path per line, appended by secondary
/// invocations and drained by the running instance.
#[derive(Debug, Clone)]
pub struct OpeningQueue {
    path: PathBuf,
    lock_path: PathBuf,
    timeout: Duration,
}

impl OpeningQueue {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(OPENING_QUEUE_FILE),
            lock_path: dir.join(OPENING_LOCK_FILE),
            timeout: QUEUE_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock guard for the queue; released on drop.
    fn lock(&self) -> Result<File, InstanceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(InstanceError::io(&self.lock_path))?;
        lock_with_timeout(&file, self.timeout).map_err(InstanceError::lock(&self.lock_path))?;
        Ok(file)
    }

    /// Append `path`, made absolute, to the queue.
    pub fn push(&self, path: &Path) -> Result<(), InstanceError> {
        let absolute = path
            .canonicalize()
            .or_else(|_| std::path::absolute(path))
            .map_err(InstanceError::io(path))?;
        let _guard = self.lock()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(InstanceError::io(&self.path))?;
        writeln!(file, "{}", absolute.display()).map_err(InstanceError::io(&self.path))?;
        tracing::debug!(path = %absolute.display(), "queued file for running instance");
        Ok(())
    }

    /// Take every queued path, leaving the queue empty.
    pub fn drain(&self) -> Result<Vec<PathBuf>, InstanceError> {
        let _guard = self.lock()?;
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(InstanceError::io(&self.path)(err)),
        };
        let paths: Vec<PathBuf> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        if !content.is_empty() {
            File::create(&self.path).map_err(InstanceError::io(&self.path))?;
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_sees_running_instance() {
        let dir = tempdir().unwrap();
        let Acquisition::Acquired(mut first) = InstanceLock::acquire(dir.path()).unwrap() else {
            panic!("first acquire should succeed");
        };
        assert!(matches!(
            InstanceLock::acquire(dir.path()).unwrap(),
            Acquisition::AlreadyRunning { url: None }
        ));

        first.publish_url("http://127.0.0.1:4242").unwrap();
        match InstanceLock::acquire(dir.path()).unwrap() {
            Acquisition::AlreadyRunning { url } => {
                assert_eq!(url.as_deref(), Some("http://127.0.0.1:4242"));
            }
            Acquisition::Acquired(_) => panic!("lock should still be held"),
        }
    }

    #[test]
    fn test_drop_releases_lock_and_retracts_url() {
        let dir = tempdir().unwrap();
        let Acquisition::Acquired(mut lock) = InstanceLock::acquire(dir.path()).unwrap() else {
            panic!("first acquire should succeed");
        };
        lock.publish_url("http://127.0.0.1:1").unwrap();
        drop(lock);

        assert_eq!(read_published_url(dir.path()), None);
        assert!(matches!(
            InstanceLock::acquire(dir.path()).unwrap(),
            Acquisition::Acquired(_)
        ));
    }

    #[test]
    fn test_acquire_creates_missing_runtime_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        assert!(matches!(
            InstanceLock::acquire(&nested).unwrap(),
            Acquisition::Acquired(_)
        ));
        assert!(nested.join(SERVER_LOCK_FILE).exists());
    }

    #[test]
    fn test_queue_push_then_drain() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("doc.md");
        std::fs::write(&doc, "").unwrap();
        let queue = OpeningQueue::new(dir.path());

        assert!(queue.drain().unwrap().is_empty(), "missing queue is empty");
        queue.push(&doc).unwrap();
        queue.push(&doc).unwrap();

        let drained = queue.drain().unwrap();
        assert_eq!(drained, vec![doc.canonicalize().unwrap(); 2]);
        assert!(queue.drain().unwrap().is_empty());
    }

    #[test]
    fn test_drain_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let queue = OpeningQueue::new(dir.path());
        std::fs::write(queue.path(), "\n/tmp/a.md\n  \n/tmp/b.md").unwrap();

        assert_eq!(
            queue.drain().unwrap(),
            vec![PathBuf::from("/tmp/a.md"), PathBuf::from("/tmp/b.md")]
        );
        assert_eq!(std::fs::read_to_string(queue.path()).unwrap(), "");
    }

    #[test]
    fn test_push_times_out_while_queue_is_locked() {
        let dir = tempdir().unwrap();
        let queue = OpeningQueue::new(dir.path()).with_timeout(Duration::from_millis(120));
        let holder = File::create(dir.path().join(OPENING_LOCK_FILE)).unwrap();
        try_lock_file(&holder).unwrap();

        let err = queue.push(&dir.path().join("x.md")).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::Lock {
                source: LockError::Timeout(_),
                ..
            }
        ));
    }
}
