//! Event Manager: fans synchronous and future-based events out to every
//! subscribed channel.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::browsing_context::BrowsingContextStore;
use crate::queue::EventQueue;
use crate::subscription::SubscriptionManager;

/// A not-yet-channel-resolved event, as produced by a domain store or the
/// CDP wildcard relay.
pub struct RawEvent {
    pub method: String,
    pub params: Value,
    /// `None` for session/global events.
    pub top_level_context: Option<String>,
}

/// `{payload, channel, associated top-level context or null}`. The context
/// is carried only for internal dropping logic — the channel is what gets
/// attached to the wire payload.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub method: String,
    pub params: Value,
    pub channel: Option<String>,
}

pub struct EventManager {
    subscriptions: Arc<Mutex<SubscriptionManager>>,
    contexts: Arc<Mutex<BrowsingContextStore>>,
    network_domain_enabled: Arc<AtomicBool>,
    queue: EventQueue<Vec<OutgoingMessage>>,
}

impl EventManager {
    /// `transport` is the channel the BiDi server's writer task drains —
    /// queuing here never blocks on the actual socket write. `subscriptions`
    /// and `contexts` are the same handles the Command Processor mutates, so
    /// both see identical subscription and context-liveness state.
    pub fn new(
        subscriptions: Arc<Mutex<SubscriptionManager>>,
        contexts: Arc<Mutex<BrowsingContextStore>>,
        transport: mpsc::UnboundedSender<OutgoingMessage>,
    ) -> Self {
        let queue = EventQueue::new(move |messages: Vec<OutgoingMessage>| {
            let transport = transport.clone();
            async move {
                for msg in messages {
                    let _ = transport.send(msg);
                }
            }
        });
        Self {
            subscriptions,
            contexts,
            network_domain_enabled: Arc::new(AtomicBool::new(false)),
            queue,
        }
    }

    async fn channels_for(&self, event_name: &str, top_level_context: Option<&str>) -> Vec<Option<String>> {
        self.subscriptions
            .lock()
            .await
            .get_channels_subscribed_to_event(event_name, top_level_context.unwrap_or(""))
    }

    /// Emits a synchronous event: channels are resolved immediately against
    /// the current subscription state.
    pub async fn emit(&self, method: impl Into<String>, params: Value, top_level_context: Option<String>, tag: impl Into<String>) {
        let method = method.into();
        let channels = self.channels_for(&method, top_level_context.as_deref()).await;
        if channels.is_empty() {
            return;
        }
        let messages: Vec<OutgoingMessage> = channels
            .into_iter()
            .map(|channel| OutgoingMessage { method: method.clone(), params: params.clone(), channel })
            .collect();
        self.queue.add_ready(messages, tag);
    }

    /// `registerPromiseEvent`. Channel resolution — and the closed-context
    /// / no-subscriber drop — happens once `future` resolves, not at
    /// registration time.
    pub fn register_promise_event<Fut>(&self, future: Fut, tag: impl Into<String>)
    where
        Fut: Future<Output = Option<RawEvent>> + Send + 'static,
    {
        let subscriptions = self.subscriptions.clone();
        let contexts = self.contexts.clone();
        let wrapped = async move {
            let event = future.await?;
            if let Some(ctx) = &event.top_level_context {
                if contexts.lock().await.get(ctx).is_none() {
                    return None;
                }
            }
            let channels = subscriptions
                .lock()
                .await
                .get_channels_subscribed_to_event(&event.method, event.top_level_context.as_deref().unwrap_or(""));
            if channels.is_empty() {
                return None;
            }
            Some(
                channels
                    .into_iter()
                    .map(|channel| OutgoingMessage { method: event.method.clone(), params: event.params.clone(), channel })
                    .collect(),
            )
        };
        self.queue.add(wrapped, tag);
    }

    /// Recomputes `networkDomainEnabled`; call after every subscribe and
    /// unsubscribe. Consumed when a new CDP target is initialized, to decide
    /// whether to enable the `Network` domain up front.
    pub async fn refresh_network_domain_flag(&self) {
        let enabled = self.subscriptions.lock().await.any_subscribed_to_module("network");
        self.network_domain_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn network_domain_enabled(&self) -> bool {
        self.network_domain_enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    fn managers() -> (Arc<Mutex<SubscriptionManager>>, Arc<Mutex<BrowsingContextStore>>) {
        let mut contexts = BrowsingContextStore::new();
        contexts.create_top_level("ctx1".into(), None);
        (Arc::new(Mutex::new(SubscriptionManager::new())), Arc::new(Mutex::new(contexts)))
    }

    #[tokio::test]
    async fn emit_drops_when_no_subscribers() {
        let (subs, contexts) = managers();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mgr = EventManager::new(subs, contexts, tx);
        mgr.emit("browsingContext.load", serde_json::json!({}), Some("ctx1".into()), "load").await;
        sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_delivers_to_subscribed_channel() {
        let (subs, contexts) = managers();
        {
            let mut store = BrowsingContextStore::new();
            store.create_top_level("ctx1".into(), None);
            subs.lock()
                .await
                .subscribe(&["browsingContext".to_string()], &["ctx1".to_string()], Some("A".to_string()), &store)
                .unwrap();
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mgr = EventManager::new(subs, contexts, tx);
        mgr.emit("browsingContext.load", serde_json::json!({"x": 1}), Some("ctx1".into()), "load").await;
        sleep(Duration::from_millis(20)).await;
        let msg = rx.try_recv().expect("message delivered");
        assert_eq!(msg.channel.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn promise_event_dropped_when_context_closes_before_resolution() {
        let (subs, contexts) = managers();
        {
            let mut store = BrowsingContextStore::new();
            store.create_top_level("ctx1".into(), None);
            subs.lock()
                .await
                .subscribe(&["browsingContext".to_string()], &[], Some("A".to_string()), &store)
                .unwrap();
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mgr = EventManager::new(subs, contexts.clone(), tx);
        mgr.register_promise_event(
            async move {
                sleep(Duration::from_millis(10)).await;
                Some(RawEvent {
                    method: "browsingContext.load".into(),
                    params: serde_json::json!({}),
                    top_level_context: Some("ctx1".into()),
                })
            },
            "load",
        );
        contexts.lock().await.destroy("ctx1");
        sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }
}
