//! One broker round trip per request.

use std::future::Future;
use std::sync::Arc;

use crate::keys::MessageKeyProvider;
use crate::messaging::{MessageEnvelope, MessagePublisher, MessageRegistry};
use crate::pipeline::types::{decode_response, encode_request, ProxyRequest, ProxyResponse, ProxyResult};

/// Register, publish, await, decode.
pub struct PrimitiveHandler<P> {
    keys: Arc<dyn MessageKeyProvider>,
    publisher: Arc<P>,
    registry: MessageRegistry,
}

impl<P> Clone for PrimitiveHandler<P> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            publisher: self.publisher.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<P: MessagePublisher> PrimitiveHandler<P> {
    pub fn new(keys: Arc<dyn MessageKeyProvider>, publisher: Arc<P>, registry: MessageRegistry) -> Self {
        Self {
            keys,
            publisher,
            registry,
        }
    }

    pub async fn handle<C>(&self, request: ProxyRequest, cancel: C) -> ProxyResult<ProxyResponse>
    where
        C: Future<Output = ()> + Send + 'static,
    {
        let key = self.keys.message_key(&request);
        tracing::debug!(key = %key, method = %request.method, path = %request.path, "Forwarding request to broker");

        // Register before publishing: a response that lands between the two
        // would otherwise be dropped as unrequested.
        let response = self.registry.register(&key, cancel);
        self.publisher
            .publish(MessageEnvelope::new(key, encode_request(&request)))
            .await;

        let message = response.await?;
        decode_response(&message)
    }
}
