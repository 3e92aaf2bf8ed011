//! Correlation registry: callers await a response envelope by message key.
//!
//! Each pending key owns one single-assignment slot (a watch channel holding
//! `None` until resolved). Concurrent registrations for the same key share
//! the slot, so one inbound envelope resolves all of them.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::messaging::types::{MessageEnvelope, WaitError};

type ResponseSlot = Arc<watch::Sender<Option<MessageEnvelope>>>;

struct PendingWaiter {
    /// Distinguishes this slot from later ones installed under the same key.
    id: u64,
    slot: ResponseSlot,
}

/// Thread-safe map of message key -> pending response.
#[derive(Clone, Default)]
pub struct MessageRegistry {
    waiters: Arc<DashMap<String, PendingWaiter>>,
    next_id: Arc<AtomicU64>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the response for `key`.
    ///
    /// The waiter is installed before this returns, so a caller can register,
    /// publish, and only then await. The returned future fails with
    /// [`WaitError::Cancelled`] if `cancel` resolves first. When the caller
    /// that installed the slot stops waiting (cancelled or dropped), the entry
    /// is removed and the next registration starts a fresh wait; callers that
    /// joined the slot keep waiting on their own deadlines.
    pub fn register<C>(
        &self,
        key: &str,
        cancel: C,
    ) -> impl Future<Output = Result<MessageEnvelope, WaitError>> + Send + 'static
    where
        C: Future<Output = ()> + Send + 'static,
    {
        let (slot, installer) = match self.waiters.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().slot.clone(), None),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, _) = watch::channel(None);
                let slot = Arc::new(tx);
                entry.insert(PendingWaiter {
                    id,
                    slot: slot.clone(),
                });
                let guard = InstallerGuard {
                    waiters: self.waiters.clone(),
                    key: key.to_string(),
                    id,
                };
                (slot, Some(guard))
            }
        };
        let response = slot.subscribe();

        async move {
            let _installer = installer;
            // Holding the sender keeps the slot open even if the entry is
            // removed by the installer going away.
            let _slot = slot;
            tokio::select! {
                message = wait_for_response(response) => {
                    message.ok_or(WaitError::Closed)
                }
                _ = cancel => Err(WaitError::Cancelled),
            }
        }
    }

    /// Resolve the waiter for `message.key`.
    ///
    /// Messages nobody is waiting for are dropped: responses may race ahead
    /// of registration or arrive twice.
    pub fn complete(&self, message: MessageEnvelope) {
        match self.waiters.remove(&message.key) {
            Some((key, waiter)) => {
                tracing::debug!(key = %key, "Resolving pending response");
                waiter.slot.send_replace(Some(message));
            }
            None => {
                tracing::debug!(key = %message.key, "No waiter registered, dropping message");
            }
        }
    }

    /// True when no keys are pending.
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }
}

async fn wait_for_response(
    mut response: watch::Receiver<Option<MessageEnvelope>>,
) -> Option<MessageEnvelope> {
    let message = response.wait_for(Option::is_some).await.ok()?.clone();
    message
}

/// Removes the installer's entry once its wait ends for any reason.
struct InstallerGuard {
    waiters: Arc<DashMap<String, PendingWaiter>>,
    key: String,
    id: u64,
}

impl Drop for InstallerGuard {
    fn drop(&mut self) {
        if self
            .waiters
            .remove_if(&self.key, |_, waiter| waiter.id == self.id)
            .is_some()
        {
            tracing::debug!(key = %self.key, "Installer stopped waiting, pending response removed");
        }
    }
}
