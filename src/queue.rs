//! Order-preserving async event queue.
//!
//! Preserves the order in which [`EventQueue::add`] was *called*, even
//! though the futures passed to it resolve in an arbitrary order. A failed
//! slot is logged with its tag and dropped — the queue never backpressures
//! on a stuck or failed producer.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// One registered-but-not-yet-delivered event.
struct Slot<T> {
    rx: oneshot::Receiver<Option<T>>,
    tag: String,
}

/// A single-consumer, many-producer ordered queue. `T` is the payload type
/// (an [`crate::events::OutgoingMessage`] in production, anything in
/// tests).
pub struct EventQueue<T> {
    submit: mpsc::UnboundedSender<Slot<T>>,
    _worker: tokio::task::JoinHandle<()>,
}

impl<T: Send + 'static> EventQueue<T> {
    /// Builds a queue that flushes resolved payloads, in registration
    /// order, to `sink`.
    pub fn new<S, Fut>(mut sink: S) -> Self
    where
        S: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (submit, mut incoming) = mpsc::unbounded_channel::<Slot<T>>();
        let worker = tokio::spawn(async move {
            let mut queue: VecDeque<Slot<T>> = VecDeque::new();
            loop {
                let Some(mut front) = queue.pop_front() else {
                    match incoming.recv().await {
                        Some(slot) => queue.push_back(slot),
                        None => break,
                    }
                    continue;
                };
                tokio::select! {
                    biased;
                    res = &mut front.rx => {
                        match res {
                            Ok(Some(payload)) => sink(payload).await,
                            Ok(None) => warn!(tag = %front.tag, "event future failed, skipping"),
                            Err(_) => warn!(tag = %front.tag, "event future canceled, skipping"),
                        }
                    }
                    maybe_slot = incoming.recv() => {
                        // front hasn't resolved yet; put it back at the head
                        // and enqueue whatever just arrived behind it.
                        queue.push_front(front);
                        match maybe_slot {
                            Some(slot) => queue.push_back(slot),
                            None => {
                                // No more producers; drain what's queued, in order.
                                while let Some(slot) = queue.pop_front() {
                                    match slot.rx.await {
                                        Ok(Some(payload)) => sink(payload).await,
                                        Ok(None) => warn!(tag = %slot.tag, "event future failed, skipping"),
                                        Err(_) => warn!(tag = %slot.tag, "event future canceled, skipping"),
                                    }
                                }
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { submit, _worker: worker }
    }

    /// Registers a future whose eventual success value will be flushed to
    /// the sink once every future registered before it has been flushed.
    pub fn add<Fut>(&self, future: Fut, tag: impl Into<String>)
    where
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let tag = tag.into();
        tokio::spawn(async move {
            let result = future.await;
            let _ = tx.send(result);
        });
        // If the worker has already shut down the slot is silently
        // dropped — there is no consumer left to preserve order for.
        let _ = self.submit.send(Slot { rx, tag });
    }

    /// Convenience for payloads that are already available (no round-trip
    /// involved, e.g. synchronous events in C4).
    pub fn add_ready(&self, payload: T, tag: impl Into<String>) {
        self.add(async move { Some(payload) }, tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn preserves_registration_order_despite_resolve_order() {
        let observed = Arc::new(TokioMutex::new(Vec::new()));
        let sink_observed = observed.clone();
        let queue: EventQueue<u32> = EventQueue::new(move |v| {
            let observed = sink_observed.clone();
            async move {
                observed.lock().await.push(v);
            }
        });

        // f1 resolves last, f2 resolves first, f3 is immediate.
        queue.add(
            async {
                sleep(Duration::from_millis(40)).await;
                Some(1)
            },
            "f1",
        );
        queue.add(
            async {
                sleep(Duration::from_millis(5)).await;
                Some(2)
            },
            "f2",
        );
        queue.add_ready(3, "f3");

        sleep(Duration::from_millis(100)).await;
        assert_eq!(*observed.lock().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_slot_is_skipped_not_blocking() {
        let observed = Arc::new(TokioMutex::new(Vec::new()));
        let sink_observed = observed.clone();
        let queue: EventQueue<u32> = EventQueue::new(move |v| {
            let observed = sink_observed.clone();
            async move {
                observed.lock().await.push(v);
            }
        });

        queue.add(async { None }, "failed");
        queue.add_ready(42, "ok");

        sleep(Duration::from_millis(20)).await;
        assert_eq!(*observed.lock().await, vec![42]);
    }
}
