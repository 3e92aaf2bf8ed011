//! Pump from the transport's inbound stream into the registry.

use futures_util::StreamExt;
use std::sync::Arc;

use crate::lifecycle::ShutdownSignal;
use crate::messaging::registry::MessageRegistry;
use crate::messaging::types::MessageReader;

/// Long-running task draining a [`MessageReader`].
///
/// Performs no buffering of its own; backpressure comes from the reader's
/// bounded queue.
pub struct MessageConsumer<R> {
    reader: Arc<R>,
    registry: MessageRegistry,
}

impl<R: MessageReader> MessageConsumer<R> {
    pub fn new(reader: Arc<R>, registry: MessageRegistry) -> Self {
        Self { reader, registry }
    }

    /// Drain until shutdown or until the reader's stream ends.
    pub async fn run(self, shutdown: ShutdownSignal) {
        tracing::info!("Message consumer started");

        let mut messages = std::pin::pin!(self.reader.read(shutdown.cancelled()));
        let mut delivered: u64 = 0;
        while let Some(message) = messages.next().await {
            delivered += 1;
            self.registry.complete(message);
        }

        tracing::info!(delivered, "Message consumer stopped");
    }
}
