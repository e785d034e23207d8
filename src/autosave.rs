//! Timer-driven auto-save.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::session::Session;

/// Save dirty tabs every `period` until the task is aborted.
///
/// The first save happens one full period after spawning.
pub fn spawn_auto_save(session: Session, period: Duration) -> JoinHandle<()> {
    tracing::info!(?period, "auto-save enabled");
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let pass = session.clone();
            match tokio::task::spawn_blocking(move || pass.auto_save()).await {
                Ok(report) if !report.is_empty() => tracing::debug!(
                    saved = report.saved.len(),
                    failed = report.failed.len(),
                    "auto-save pass"
                ),
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "auto-save pass panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::AppEvent;
    use tempfile::tempdir;

    const PERIOD: Duration = Duration::from_secs(30);

    /// Let the spawned task run up to its next await point.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_after_interval_elapses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "old").unwrap();
        let session = Session::new(Config::default());
        let id = session.open_path(&path).unwrap().id;
        session.update(id, "new".to_string(), None, None).unwrap();

        let mut events = session.subscribe();

        let task = spawn_auto_save(session.clone(), PERIOD);
        settle().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old", "no save at spawn");

        tokio::time::advance(PERIOD - Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");

        tokio::time::advance(Duration::from_secs(1)).await;
        let event = events.recv().await.unwrap();
        assert!(matches!(event, AppEvent::Saved { auto: true, .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!session.workspace().has_unsaved_changes());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_documents_are_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "same").unwrap();
        let session = Session::new(Config::default());
        session.open_path(&path).unwrap();
        let mut events = session.subscribe();

        let task = spawn_auto_save(session.clone(), PERIOD);
        for _ in 0..3 {
            tokio::time::advance(PERIOD).await;
            settle().await;
        }
        assert!(events.try_recv().is_err(), "clean tabs produce no events");
        task.abort();
    }
}
