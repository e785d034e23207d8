//! Opens files handed over by secondary invocations.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::FileWatcher;
use crate::instance::OpeningQueue;
use crate::session::Session;

/// How often the queue watcher is polled.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const QUEUE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Drain `queue` once now and again whenever it changes, opening each path
/// as a tab. Falls back to draining on every poll if the file cannot be watched.
pub fn spawn_queue_watcher(session: Session, queue: OpeningQueue) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut watcher = match FileWatcher::new(queue.path(), QUEUE_DEBOUNCE) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(%err, "cannot watch opening queue, polling instead");
                None
            }
        };
        let mut ticker = interval(QUEUE_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut startup = true;
        loop {
            ticker.tick().await;
            let changed = watcher.as_mut().is_none_or(FileWatcher::take_change_ready);
            if startup || changed {
                startup = false;
                drain_once(&session, &queue).await;
            }
        }
    })
}

async fn drain_once(session: &Session, queue: &OpeningQueue) {
    let queue = queue.clone();
    // Waiting on the queue lock blocks.
    match tokio::task::spawn_blocking(move || queue.drain()).await {
        Ok(Ok(paths)) if paths.is_empty() => {}
        Ok(Ok(paths)) => {
            tracing::info!(count = paths.len(), "opening queued files");
            session.open_queued(&paths);
        }
        Ok(Err(err)) => tracing::warn!(%err, "failed to read opening queue"),
        Err(err) => tracing::warn!(%err, "opening queue task failed"),
    }
}
