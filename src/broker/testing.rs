//! Scratch directories for broker tests.

use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::config::BrokerConfig;

/// A unique directory under the system temp dir, removed on drop.
pub(crate) struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub(crate) fn new() -> Self {
        let path = std::env::temp_dir().join(format!("broker-proxy-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub(crate) fn write(&self, name: &str, content: &[u8]) {
        std::fs::write(self.file(name), content).unwrap();
    }

    /// Write through a temporary name and rename into place.
    pub(crate) fn write_atomic(&self, name: &str, content: &[u8]) {
        let tmp = self.file(&format!("{name}.tmp"));
        std::fs::write(&tmp, content).unwrap();
        std::fs::rename(tmp, self.file(name)).unwrap();
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.file(name).exists()
    }

    /// Broker settings with short retry delays.
    pub(crate) fn config(&self) -> BrokerConfig {
        BrokerConfig {
            request_retry_delay_ms: 10,
            ..BrokerConfig::with_directory(self.path.to_string_lossy())
        }
    }

    /// Poll until `name` no longer exists.
    pub(crate) async fn wait_until_gone(&self, name: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.exists(name) {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
