//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use broker_proxy::broker::Responder;
use broker_proxy::config::ProxyConfig;
use broker_proxy::lifecycle::{bind, bootstrap, Shutdown};

/// A broker directory under the system temp dir, removed on drop.
pub struct TempBroker {
    path: PathBuf,
}

impl TempBroker {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("broker-proxy-it-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the request artifacts currently present.
    pub fn requests(&self) -> Vec<String> {
        std::fs::read_dir(&self.path)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".req"))
            .collect()
    }

    /// Poll until at least one request artifact exists.
    pub async fn wait_for_request(&self, timeout: Duration) -> String {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(name) = self.requests().into_iter().next() {
                return name;
            }
            assert!(tokio::time::Instant::now() < deadline, "no request artifact appeared");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Write a response artifact through a temporary name.
    pub fn respond(&self, key: &str, content: &[u8]) {
        let tmp = self.path.join(format!("{key}.resp.tmp"));
        std::fs::write(&tmp, content).unwrap();
        std::fs::rename(tmp, self.path.join(format!("{key}.resp"))).unwrap();
    }
}

impl Drop for TempBroker {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Config for a proxy on an ephemeral port backed by `broker`.
pub fn proxy_config(broker: &TempBroker, advanced: bool) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.request_secs = 5;
    config.application.use_advanced_mode = advanced;
    config.message_broker.directory_path = broker.path().to_string_lossy().into_owned();
    config.message_broker.request_retry_delay_ms = 10;
    config
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("proxy should stop")
            .unwrap()
            .unwrap();
    }
}

/// Bootstrap and serve a proxy in the background.
pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let shutdown = Arc::new(Shutdown::new());
    let app = bootstrap(&config, &shutdown).await.unwrap();
    let listener = bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(app.run(listener, shutdown.clone()));
    RunningProxy { addr, shutdown, handle }
}

/// Answer every request in `broker` with `status`, echoing the request line.
/// Stops when the returned coordinator is triggered or dropped.
pub fn spawn_responder(broker: &TempBroker, status: u16) -> Shutdown {
    let shutdown = Shutdown::new();
    let responder = Responder::new(broker.path(), status, None);
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        responder.run(Duration::from_millis(10), signal).await;
    });
    shutdown
}
