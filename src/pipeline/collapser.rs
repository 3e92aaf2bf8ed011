//! Single-flight execution per coalesce key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::observability::metrics;
use crate::pipeline::types::{ProxyError, ProxyResult};

type SharedOutcome<T> = Shared<BoxFuture<'static, ProxyResult<T>>>;

struct InFlightOperation<T> {
    id: u64,
    outcome: SharedOutcome<T>,
}

/// Deduplicates concurrent operations sharing a coalesce key.
///
/// The shared operation runs on its own task and removes its map entry when
/// it finishes. A caller that stops waiting never affects the operation or
/// the other callers.
pub struct Collapser<T> {
    in_flight: Arc<DashMap<String, InFlightOperation<T>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for Collapser<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: self.in_flight.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T> Default for Collapser<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T> Collapser<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` unless an operation for `key` is already in flight,
    /// then wait for the shared outcome until `cancel` resolves.
    pub async fn run<F, Fut, C>(&self, key: &str, producer: F, cancel: C) -> ProxyResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProxyResult<T>> + Send + 'static,
        C: Future<Output = ()>,
    {
        let outcome = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(coalesce_key = %key, "Joining in-flight operation");
                metrics::record_collapsed();
                entry.get().outcome.clone()
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let outcome = rx
                    .map(|received| {
                        received.unwrap_or_else(|_| {
                            Err(ProxyError::Internal(
                                "collapsed operation ended without a result".to_string(),
                            ))
                        })
                    })
                    .boxed()
                    .shared();
                entry.insert(InFlightOperation {
                    id,
                    outcome: outcome.clone(),
                });
                self.spawn_operation(key.to_string(), id, producer(), tx);
                outcome
            }
        };

        tokio::select! {
            result = outcome => result,
            _ = cancel => Err(ProxyError::Cancelled),
        }
    }

    /// Number of coalesce keys with an operation in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn spawn_operation<Fut>(
        &self,
        key: String,
        id: u64,
        operation: Fut,
        tx: oneshot::Sender<ProxyResult<T>>,
    ) where
        Fut: Future<Output = ProxyResult<T>> + Send + 'static,
    {
        let completion = Completion {
            in_flight: self.in_flight.clone(),
            key,
            id,
            tx: Some(tx),
        };
        tokio::spawn(async move {
            let result = operation.await;
            completion.finish(result);
        });
    }
}

/// Owns the operation's map entry; removes it on completion or panic.
struct Completion<T> {
    in_flight: Arc<DashMap<String, InFlightOperation<T>>>,
    key: String,
    id: u64,
    tx: Option<oneshot::Sender<ProxyResult<T>>>,
}

impl<T> Completion<T> {
    fn finish(mut self, result: ProxyResult<T>) {
        // Remove before publishing so a caller that sees the outcome and
        // immediately retries starts a fresh execution.
        self.remove_entry();
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }

    fn remove_entry(&self) {
        self.in_flight.remove_if(&self.key, |_, op| op.id == self.id);
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        // The sender field is dropped after this, so waiters never observe a
        // closed channel while the entry still exists.
        self.remove_entry();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ProxyResponse;
    use futures_util::future::join_all;
    use std::future::pending;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn ok_response() -> ProxyResponse {
        ProxyResponse {
            status_code: 200,
            body: "ok".to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_key_coalesces_then_cleans_up() {
        let collapser = Collapser::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, ProxyError>(ok_response())
            }
        };

        let results = join_all((0..20).map(|_| collapser.run("KEY", inner, pending()))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_ref() == Ok(&ok_response())));
        assert_eq!(collapser.in_flight_count(), 0);

        let again = collapser.run("KEY", inner, pending()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(again.status_code, 200);
    }

    #[tokio::test]
    async fn test_failure_is_shared_by_all_waiters() {
        let collapser: Collapser<ProxyResponse> = Collapser::new();
        let producer = || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<ProxyResponse, _>(ProxyError::Decode("bad status".into()))
        };

        let results = join_all((0..5).map(|_| collapser.run("k", producer, pending()))).await;
        assert!(results
            .iter()
            .all(|r| r == &Err(ProxyError::Decode("bad status".into()))));
        assert_eq!(collapser.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_abort_shared_operation() {
        let collapser = Collapser::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let producer = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, ProxyError>(ok_response())
            }
        };

        let impatient = collapser.run("k", producer, tokio::time::sleep(Duration::from_millis(10)));
        let patient = collapser.run("k", producer, pending());
        let (impatient, patient) = tokio::join!(impatient, patient);

        assert_eq!(impatient, Err(ProxyError::Cancelled));
        assert_eq!(patient, Ok(ok_response()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operation_outlives_all_callers() {
        let collapser = Collapser::new();
        let producer = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ProxyError>(ok_response())
        };

        let result = collapser
            .run("k", producer, tokio::time::sleep(Duration::from_millis(5)))
            .await;
        assert_eq!(result, Err(ProxyError::Cancelled));
        // Still in flight: the entry belongs to the operation, not the caller.
        assert_eq!(collapser.in_flight_count(), 1);

        let never_runs = || async { Err::<ProxyResponse, _>(ProxyError::Internal("second producer ran".into())) };
        let joined = collapser.run("k", never_runs, pending()).await;
        assert_eq!(joined, Ok(ok_response()));
        assert_eq!(collapser.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let collapser = Collapser::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let producer = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProxyError>(ok_response())
            }
        };

        let (a, b) = tokio::join!(
            collapser.run("a", producer, pending()),
            collapser.run("b", producer, pending())
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    fn exploding() -> ProxyResult<ProxyResponse> {
        panic!("producer blew up")
    }

    #[tokio::test]
    async fn test_panicking_producer_surfaces_internal_error() {
        let collapser: Collapser<ProxyResponse> = Collapser::new();
        let result = collapser.run("k", || async { exploding() }, pending()).await;

        assert!(matches!(result, Err(ProxyError::Internal(_))));
        assert_eq!(collapser.in_flight_count(), 0);
    }
}
