//! In-memory transport for exercising handlers without a broker directory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::messaging::{MessageEnvelope, MessagePublisher, MessageRegistry};

/// Publisher that answers every message through the registry after a delay.
pub(crate) struct LoopbackPublisher {
    registry: MessageRegistry,
    reply: Option<Vec<u8>>,
    delay: Duration,
    published: Mutex<Vec<MessageEnvelope>>,
}

impl LoopbackPublisher {
    pub(crate) fn replying(payload: &[u8]) -> Arc<Self> {
        Self::replying_after(payload, Duration::from_millis(5))
    }

    pub(crate) fn replying_after(payload: &[u8], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            registry: MessageRegistry::new(),
            reply: Some(payload.to_vec()),
            delay,
            published: Mutex::new(Vec::new()),
        })
    }

    /// Never answers.
    pub(crate) fn silent() -> Arc<Self> {
        Arc::new(Self {
            registry: MessageRegistry::new(),
            reply: None,
            delay: Duration::ZERO,
            published: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn registry(&self) -> MessageRegistry {
        self.registry.clone()
    }

    pub(crate) fn published(&self) -> Vec<MessageEnvelope> {
        self.published.lock().unwrap().clone()
    }
}

impl MessagePublisher for LoopbackPublisher {
    async fn publish(&self, message: MessageEnvelope) {
        self.published.lock().unwrap().push(message.clone());

        if let Some(reply) = self.reply.clone() {
            let registry = self.registry.clone();
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                registry.complete(MessageEnvelope::new(message.key, reply));
            });
        }
    }
}
