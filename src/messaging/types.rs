//! Envelope type and the transport contract.

use futures_util::Stream;
use std::future::Future;
use thiserror::Error;

/// A keyed, opaque message moved across the broker.
///
/// Two envelopes with the same key are interchangeable for correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Correlates a request with its response.
    pub key: String,
    pub payload: Vec<u8>,
}

impl MessageEnvelope {
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

/// Why a registered wait ended without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("wait cancelled before a response arrived")]
    Cancelled,

    #[error("response slot closed without a value")]
    Closed,
}

/// Outbound half of the transport.
///
/// Publishing never fails from the caller's point of view: transient
/// failures are retried and then absorbed by the implementation.
pub trait MessagePublisher: Send + Sync + 'static {
    fn publish(&self, message: MessageEnvelope) -> impl Future<Output = ()> + Send;
}

/// Inbound half of the transport.
pub trait MessageReader: Send + Sync + 'static {
    /// Stream of inbound envelopes for a single consumer.
    ///
    /// Ends when `cancel` resolves or the transport shuts down.
    fn read<C>(&self, cancel: C) -> impl Stream<Item = MessageEnvelope> + Send + 'static
    where
        C: Future<Output = ()> + Send + 'static;
}
