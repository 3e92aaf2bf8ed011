//! Request collapsing on top of the primitive handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::keys::CoalesceKeyProvider;
use crate::lifecycle::ShutdownSignal;
use crate::messaging::MessagePublisher;
use crate::pipeline::collapser::Collapser;
use crate::pipeline::primitive::PrimitiveHandler;
use crate::pipeline::types::{ProxyRequest, ProxyResponse, ProxyResult};

/// Routes every request through a [`Collapser`] keyed by its coalesce key.
pub struct CollapsingHandler<P> {
    inner: PrimitiveHandler<P>,
    coalesce: Arc<dyn CoalesceKeyProvider>,
    collapser: Collapser<ProxyResponse>,
    /// Upper bound on a shared round trip. After the artifact TTL the request
    /// file is gone and no response can arrive.
    operation_timeout: Duration,
    shutdown: ShutdownSignal,
}

impl<P> Clone for CollapsingHandler<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            coalesce: self.coalesce.clone(),
            collapser: self.collapser.clone(),
            operation_timeout: self.operation_timeout,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<P: MessagePublisher> CollapsingHandler<P> {
    pub fn new(
        inner: PrimitiveHandler<P>,
        coalesce: Arc<dyn CoalesceKeyProvider>,
        operation_timeout: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            inner,
            coalesce,
            collapser: Collapser::new(),
            operation_timeout,
            shutdown,
        }
    }

    /// The shared round trip runs without the caller's cancellation; only
    /// the caller's own wait on it is cancellable. The round trip itself ends
    /// at the operation timeout or on shutdown, whichever comes first.
    pub async fn handle<C>(&self, request: ProxyRequest, cancel: C) -> ProxyResult<ProxyResponse>
    where
        C: Future<Output = ()> + Send + 'static,
    {
        let coalesce_key = self.coalesce.coalesce_key(&request);
        let inner = self.inner.clone();
        let deadline = tokio::time::sleep(self.operation_timeout);
        let shutdown = self.shutdown.clone();
        let bound = async move {
            tokio::select! {
                _ = deadline => {}
                _ = shutdown.cancelled() => {}
            }
        };
        self.collapser
            .run(
                &coalesce_key,
                move || async move { inner.handle(request, bound).await },
                cancel,
            )
            .await
    }

    pub fn in_flight_count(&self) -> usize {
        self.collapser.in_flight_count()
    }
}
