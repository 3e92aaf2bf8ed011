//! Filesystem-backed message broker.
//!
//! Requests are published as `<key>.req` files; a backend answers by writing
//! `<key>.resp`. Response files are found through a directory watcher plus a
//! scan at startup, read with retries and handed to the single reader
//! through a bounded queue. Both artifacts are deleted once the response has
//! been handled.

use dashmap::DashSet;
use futures_util::stream::{self, Stream};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Semaphore};

use crate::broker::artifacts::{
    artifact_key, artifact_path, display_name, is_response_artifact, remove_artifact, REQUEST_EXTENSION,
};
use crate::broker::sweep::run_sweeper;
use crate::broker::types::{BrokerResult, Delivery, WriteOutcome};
use crate::config::BrokerConfig;
use crate::lifecycle::Shutdown;
use crate::messaging::{MessageEnvelope, MessagePublisher, MessageReader};
use crate::observability::metrics;
use crate::resilience::{retry_with_fixed_delay, RetryPolicy};

/// Message transport over a shared directory.
///
/// Dropping the broker disposes it.
pub struct FileMessageBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    directory: PathBuf,
    retry: RetryPolicy,
    write_limit: Semaphore,
    deliveries: mpsc::Sender<MessageEnvelope>,
    /// Receiving end of `deliveries`, until a reader takes it.
    inbox: Mutex<Option<mpsc::Receiver<MessageEnvelope>>>,
    /// Response paths with a discovery task running.
    in_discovery: DashSet<PathBuf>,
    shutdown: Shutdown,
    watcher: Mutex<Option<RecommendedWatcher>>,
    disposed: AtomicBool,
}

impl FileMessageBroker {
    /// Create the broker directory, attach the watcher, dispatch responses
    /// already present and start the TTL sweep.
    pub async fn start(config: &BrokerConfig) -> BrokerResult<Self> {
        tokio::fs::create_dir_all(&config.directory_path).await?;
        let directory = tokio::fs::canonicalize(&config.directory_path).await?;

        let (deliveries, inbox) = mpsc::channel(config.response_cache_count.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watcher = watch_responses(&directory, events_tx.clone())?;

        let inner = Arc::new(BrokerInner {
            directory: directory.clone(),
            retry: RetryPolicy::from(config),
            write_limit: Semaphore::new(config.concurrent_request_count.max(1)),
            deliveries,
            inbox: Mutex::new(Some(inbox)),
            in_discovery: DashSet::new(),
            shutdown: Shutdown::new(),
            watcher: Mutex::new(Some(watcher)),
            disposed: AtomicBool::new(false),
        });

        tokio::spawn(dispatch(inner.clone(), events_rx));

        // The watcher is already attached, so nothing written from here on
        // is missed; files seen twice are deduplicated by the dispatcher.
        let existing = scan_responses(&directory).await?;
        let found = existing.len();
        for path in existing {
            let _ = events_tx.send(path);
        }
        drop(events_tx);

        tokio::spawn(run_sweeper(
            directory.clone(),
            config.time_to_live(),
            config.sweep_period(),
            inner.shutdown.subscribe(),
        ));

        tracing::info!(
            directory = %directory.display(),
            existing_responses = found,
            max_concurrent_writes = config.concurrent_request_count,
            queue_capacity = config.response_cache_count,
            "File message broker started"
        );

        Ok(Self { inner })
    }

    /// Stop the watcher, sweep and dispatcher and end the reader stream.
    ///
    /// Publishes still waiting for a write permit are dropped. Calling this
    /// more than once has no further effect.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.shutdown.trigger();
        self.inner.write_limit.close();
        drop(self.inner.watcher.lock().unwrap_or_else(PoisonError::into_inner).take());

        tracing::info!(directory = %self.inner.directory.display(), "File message broker stopped");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }
}

impl Drop for FileMessageBroker {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl MessagePublisher for FileMessageBroker {
    async fn publish(&self, message: MessageEnvelope) {
        self.inner.publish(message).await
    }
}

impl MessageReader for FileMessageBroker {
    fn read<C>(&self, cancel: C) -> impl Stream<Item = MessageEnvelope> + Send + 'static
    where
        C: Future<Output = ()> + Send + 'static,
    {
        let inbox = self.inner.inbox.lock().unwrap_or_else(PoisonError::into_inner).take();
        if inbox.is_none() {
            tracing::error!("Delivery queue already taken by another reader");
        }

        let state = (inbox, Box::pin(cancel), self.inner.shutdown.subscribe());
        stream::unfold(state, |(inbox, mut cancel, mut shutdown)| async move {
            let Some(mut inbox) = inbox else {
                return None;
            };
            let next = tokio::select! {
                biased;
                _ = &mut cancel => None,
                _ = shutdown.recv() => None,
                message = inbox.recv() => message,
            };
            next.map(|message| (message, (Some(inbox), cancel, shutdown)))
        })
    }
}

impl BrokerInner {
    async fn publish(&self, message: MessageEnvelope) {
        let Ok(_permit) = self.write_limit.acquire().await else {
            tracing::warn!(key = %message.key, "Broker stopped, request dropped");
            metrics::record_published("rejected");
            return;
        };

        let Some(path) = artifact_path(&self.directory, &message.key, REQUEST_EXTENSION) else {
            tracing::error!(key = %message.key, "Message key is not a valid file name, request dropped");
            metrics::record_published("rejected");
            return;
        };

        let result = retry_with_fixed_delay(self.retry, "write request artifact", |_| {
            write_request(&path, &message.payload)
        })
        .await;

        match result {
            Ok(WriteOutcome::Written) => {
                tracing::info!(file = %display_name(&path), bytes = message.payload.len(), "Request artifact written");
                metrics::record_published("written");
            }
            Ok(WriteOutcome::AlreadyExists) => {
                tracing::debug!(file = %display_name(&path), "Request artifact already exists");
                metrics::record_published("exists");
            }
            Err(e) => {
                tracing::error!(
                    file = %display_name(&path),
                    attempts = self.retry.max_attempts(),
                    error = %e,
                    "Failed to write request artifact"
                );
                metrics::record_published("failed");
            }
        }
    }

    /// One attempt at moving a response artifact into the delivery queue.
    async fn try_deliver(&self, path: &Path, key: &str) -> io::Result<Delivery> {
        // Capacity first, so a full queue applies backpressure instead of
        // holding file contents in memory.
        let permit = self
            .deliveries
            .reserve()
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "delivery queue closed"))?;

        let payload = match tokio::fs::read(path).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Delivery::Missing),
            Err(e) => return Err(e),
        };
        if payload.is_empty() {
            // The writer has created the file but not filled it yet.
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "response artifact is empty"));
        }

        permit.send(MessageEnvelope::new(key, payload));
        Ok(Delivery::Delivered)
    }

    async fn remove_pair(&self, response: &Path, key: &str) {
        remove_artifact(response).await;
        if let Some(request) = artifact_path(&self.directory, key, REQUEST_EXTENSION) {
            remove_artifact(&request).await;
        }
    }
}

/// Create `path` exclusively and write `payload` to it.
async fn write_request(path: &Path, payload: &[u8]) -> io::Result<WriteOutcome> {
    let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(WriteOutcome::AlreadyExists),
        Err(e) => return Err(e),
    };

    let written = async {
        file.write_all(payload).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        // A partial artifact would block every later attempt.
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    Ok(WriteOutcome::Written)
}

fn watch_responses(
    directory: &Path,
    events: mpsc::UnboundedSender<PathBuf>,
) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_create() || event.kind.is_modify() {
                    for path in event.paths.into_iter().filter(|path| is_response_artifact(path)) {
                        let _ = events.send(path);
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "Broker directory watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

async fn scan_responses(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_response_artifact(&path) {
            found.push(path);
        }
    }
    Ok(found)
}

/// Start one discovery task per response path not already being handled.
async fn dispatch(inner: Arc<BrokerInner>, mut events: mpsc::UnboundedReceiver<PathBuf>) {
    let mut shutdown = inner.shutdown.subscribe();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            event = events.recv() => match event {
                Some(path) => {
                    if inner.in_discovery.insert(path.clone()) {
                        tokio::spawn(discover(inner.clone(), path));
                    } else {
                        tracing::trace!(file = %display_name(&path), "Discovery already in progress");
                    }
                }
                None => break,
            },
        }
    }
    tracing::debug!("Broker dispatcher stopped");
}

async fn discover(inner: Arc<BrokerInner>, path: PathBuf) {
    let Some(key) = artifact_key(&path) else {
        inner.in_discovery.remove(&path);
        return;
    };

    let mut shutdown = inner.shutdown.subscribe();
    let outcome = tokio::select! {
        _ = shutdown.recv() => None,
        result = retry_with_fixed_delay(inner.retry, "read response artifact", |_| inner.try_deliver(&path, &key)) => Some(result),
    };

    match outcome {
        None => tracing::debug!(file = %display_name(&path), "Discovery abandoned on shutdown"),
        Some(Ok(Delivery::Missing)) => {
            tracing::debug!(file = %display_name(&path), "Response artifact vanished before read");
            metrics::record_discovered("missing");
        }
        Some(result) => {
            match result {
                Ok(_) => {
                    tracing::info!(file = %display_name(&path), "Response artifact delivered");
                    metrics::record_discovered("delivered");
                }
                Err(e) => {
                    tracing::error!(
                        file = %display_name(&path),
                        attempts = inner.retry.max_attempts(),
                        error = %e,
                        "Failed to read response artifact"
                    );
                    metrics::record_discovered("failed");
                }
            }
            inner.remove_pair(&path, &key).await;
        }
    }

    inner.in_discovery.remove(&path);
}
