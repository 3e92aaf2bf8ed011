//! Backend side of the broker protocol.
//!
//! Answers request artifacts with a fixed status. Used by `broker-cli
//! respond` for manual testing and by the integration tests.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::broker::artifacts::{artifact_key, artifact_path, has_extension, REQUEST_EXTENSION, RESPONSE_EXTENSION};
use crate::lifecycle::ShutdownSignal;

pub struct Responder {
    directory: PathBuf,
    status: u16,
    /// Fixed body; when unset the request line is echoed.
    body: Option<String>,
    /// Keys already answered whose request artifact is still present.
    answered: Mutex<HashSet<String>>,
}

impl Responder {
    pub fn new(directory: impl Into<PathBuf>, status: u16, body: Option<String>) -> Self {
        Self {
            directory: directory.into(),
            status,
            body,
            answered: Mutex::new(HashSet::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Answer every request artifact that has no response yet.
    ///
    /// Responses are written to a temporary name and renamed into place so
    /// the proxy never reads a partial artifact. Returns how many were written.
    pub async fn answer_pending(&self) -> io::Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut present = HashSet::new();
        let mut written = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !has_extension(&path, REQUEST_EXTENSION) {
                continue;
            }
            let Some(key) = artifact_key(&path) else {
                continue;
            };
            present.insert(key.clone());

            if self.is_answered(&key) {
                continue;
            }
            let Some(response) = artifact_path(&self.directory, &key, RESPONSE_EXTENSION) else {
                continue;
            };
            if tokio::fs::try_exists(&response).await? {
                continue;
            }

            let request = match tokio::fs::read_to_string(&path).await {
                Ok(request) => request,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if request.is_empty() {
                // Still being written.
                continue;
            }

            let body = self.body.clone().unwrap_or_else(|| request.trim().to_string());
            write_atomic(&response, format!("{}\n{}", self.status, body).as_bytes()).await?;
            self.mark_answered(key.clone());
            tracing::info!(key = %key, status = self.status, "Response written");
            written += 1;
        }

        self.answered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|key| present.contains(key));
        Ok(written)
    }

    /// Poll the directory every `interval` until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.answer_pending().await {
                        tracing::error!(directory = %self.directory.display(), error = %e, "Failed to answer requests");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    fn is_answered(&self, key: &str) -> bool {
        self.answered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(key)
    }

    fn mark_answered(&self, key: String) {
        self.answered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key);
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}
