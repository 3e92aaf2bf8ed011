//! Time-to-live sweep of broker artifacts.
//!
//! The sole guarantee against unbounded directory growth: any artifact older
//! than the TTL is deleted whether or not it was ever consumed.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time;

use crate::broker::artifacts::{is_artifact, remove_artifact};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Sweep every `period` until shutdown. The first pass runs immediately.
pub(crate) async fn run_sweeper(directory: PathBuf, ttl: Duration, period: Duration, mut shutdown: ShutdownSignal) {
    let mut ticker = time::interval(period.max(Duration::from_secs(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_expired(&directory, ttl, SystemTime::now()).await {
                    Ok(removed) => {
                        metrics::record_swept(removed);
                        tracing::info!(removed, "Broker sweep finished");
                    }
                    Err(e) => tracing::error!(error = %e, "Broker sweep failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Broker sweeper stopping");
                break;
            }
        }
    }
}

/// Delete artifacts in `directory` older than `ttl` as of `now`.
///
/// Age is measured from creation time, or from modification time where the
/// filesystem does not report creation.
pub(crate) async fn sweep_expired(directory: &Path, ttl: Duration, now: SystemTime) -> io::Result<usize> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_artifact(&path) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            // Consumed between listing and stat.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat artifact");
                continue;
            }
        };

        let Ok(born) = metadata.created().or_else(|_| metadata.modified()) else {
            continue;
        };
        let age = now.duration_since(born).unwrap_or_default();
        if age > ttl && remove_artifact(&path).await {
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::ScratchDir;

    #[tokio::test]
    async fn test_expired_artifacts_removed_regardless_of_state() {
        let dir = ScratchDir::new();
        dir.write("old.req", b"GET | /");
        dir.write("old.resp", b"200\nnever consumed");
        dir.write("notes.txt", b"not an artifact");

        let ttl = Duration::from_secs(60);
        let later = SystemTime::now() + Duration::from_secs(121);
        let removed = sweep_expired(dir.path(), ttl, later).await.unwrap();

        assert_eq!(removed, 2);
        assert!(!dir.exists("old.req"));
        assert!(!dir.exists("old.resp"));
        assert!(dir.exists("notes.txt"));
    }

    #[tokio::test]
    async fn test_fresh_artifacts_are_kept() {
        let dir = ScratchDir::new();
        dir.write("fresh.req", b"GET | /");

        let removed = sweep_expired(dir.path(), Duration::from_secs(60), SystemTime::now())
            .await
            .unwrap();

        assert_eq!(removed, 0);
        assert!(dir.exists("fresh.req"));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let dir = ScratchDir::new();
        let shutdown = crate::lifecycle::Shutdown::new();
        let task = tokio::spawn(run_sweeper(
            dir.path().to_path_buf(),
            Duration::from_secs(60),
            Duration::from_secs(30),
            shutdown.subscribe(),
        ));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper should exit")
            .unwrap();
    }
}
