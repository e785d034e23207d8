//! Advisory file locking.
//!
//! Every write MarkFlow makes to a user file, and the single-instance
//! handshake, goes through these helpers so two processes never write the
//! same file at once.
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Failure to take an advisory lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another handle holds the lock.
    #[error("file is locked by another process")]
    Locked,
    /// Another handle kept the lock past the deadline.
    #[error("timed out after {0:?} waiting for file lock")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Take an exclusive lock on `file` without blocking.
///
/// The lock is released when `file` is dropped.
pub fn try_lock_file(file: &File) -> Result<(), LockError> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(LockError::Locked),
        Err(TryLockError::Error(err)) => Err(LockError::Io(err)),
    }
}

/// Take an exclusive lock on `file`, retrying until `timeout` elapses.
pub fn lock_with_timeout(file: &File, timeout: Duration) -> Result<(), LockError> {
    let deadline = Instant::now() + timeout;
    loop {
        match try_lock_file(file) {
            Err(LockError::Locked) if Instant::now() < deadline => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(LockError::Locked) => return Err(LockError::Timeout(timeout)),
            other => return other,
        }
    }
}

/// Replace the contents of `path` while holding an exclusive lock on it.
///
/// Fails with [`LockError::Locked`] instead of waiting when another process
/// is writing the same file.
pub fn write_file_locked(path: &Path, contents: &[u8]) -> Result<(), LockError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    try_lock_file(&file)?;
    file.set_len(0)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}
