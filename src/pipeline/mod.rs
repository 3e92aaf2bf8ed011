//! Request handling pipeline.
//!
//! # Data Flow
//! ```text
//! ProxyRequest
//!     → [collapsing.rs] coalesce key → collapser.rs (one execution per key)
//!     → primitive.rs
//!         message key → registry.register()
//!         → publisher.publish(encoded request)
//!         → await response envelope
//!         → types.rs decode_response()
//!     → ProxyResponse fanned out to every waiter
//! ```
//!
//! # Design Decisions
//! - Cancellation is a plain future argument (deadline, shutdown, never)
//! - Only `Cancelled`, `Decode` and `Internal` cross this boundary
//! - The mode is chosen once at startup; there is no per-request switch

pub mod collapser;
pub mod collapsing;
pub mod primitive;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use collapser::Collapser;
pub use collapsing::CollapsingHandler;
pub use primitive::PrimitiveHandler;
pub use types::{decode_response, encode_request, ProxyError, ProxyRequest, ProxyResponse, ProxyResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ApplicationConfig;
use crate::keys::{HashedMessageKey, LowercaseCoalesceKey};
use crate::lifecycle::ShutdownSignal;
use crate::messaging::{MessagePublisher, MessageRegistry};

/// The request handler selected by configuration.
pub enum RequestPipeline<P> {
    Primitive(PrimitiveHandler<P>),
    Collapsing(CollapsingHandler<P>),
}

impl<P> Clone for RequestPipeline<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Primitive(handler) => Self::Primitive(handler.clone()),
            Self::Collapsing(handler) => Self::Collapsing(handler.clone()),
        }
    }
}

impl<P: MessagePublisher> RequestPipeline<P> {
    /// Build the pipeline with the default key strategies.
    ///
    /// `operation_timeout` and `shutdown` bound shared round trips in
    /// collapsing mode.
    pub fn new(
        config: &ApplicationConfig,
        operation_timeout: Duration,
        publisher: Arc<P>,
        registry: MessageRegistry,
        shutdown: ShutdownSignal,
    ) -> Self {
        let primitive = PrimitiveHandler::new(Arc::new(HashedMessageKey), publisher, registry);
        if config.use_advanced_mode {
            Self::Collapsing(CollapsingHandler::new(
                primitive,
                Arc::new(LowercaseCoalesceKey),
                operation_timeout,
                shutdown,
            ))
        } else {
            Self::Primitive(primitive)
        }
    }

    pub async fn handle<C>(&self, request: ProxyRequest, cancel: C) -> ProxyResult<ProxyResponse>
    where
        C: Future<Output = ()> + Send + 'static,
    {
        match self {
            Self::Primitive(handler) => handler.handle(request, cancel).await,
            Self::Collapsing(handler) => handler.handle(request, cancel).await,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Collapsing(_) => "collapsing",
        }
    }

    pub fn in_flight_count(&self) -> usize {
        match self {
            Self::Primitive(_) => 0,
            Self::Collapsing(handler) => handler.in_flight_count(),
        }
    }
}
