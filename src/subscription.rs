//! Subscription Manager: tracks which channel is subscribed to which
//! event name over which top-level contexts.

use std::collections::HashSet;

use uuid::Uuid;

use crate::browsing_context::BrowsingContextStore;
use crate::error::BidiError;

/// Static module → event-name unrolling table (a plain data table instead
/// of a lazy-initialized global).
pub const MODULE_EVENTS: &[(&str, &[&str])] = &[
    (
        "browsingContext",
        &[
            "browsingContext.contextCreated",
            "browsingContext.contextDestroyed",
            "browsingContext.navigationStarted",
            "browsingContext.fragmentNavigated",
            "browsingContext.domContentLoaded",
            "browsingContext.load",
            "browsingContext.userPromptOpened",
            "browsingContext.userPromptClosed",
        ],
    ),
    (
        "network",
        &[
            "network.beforeRequestSent",
            "network.responseStarted",
            "network.responseCompleted",
            "network.fetchError",
            "network.authRequired",
        ],
    ),
    (
        "script",
        &[
            "script.message",
            "script.realmCreated",
            "script.realmDestroyed",
        ],
    ),
    ("log", &["log.entryAdded"]),
    ("cdp", &["cdp.eventReceived"]),
];

/// Expands a requested name (a bare module name like `"network"`, or an
/// already-atomic event like `"network.beforeRequestSent"`) into the set of
/// atomic event names it denotes.
pub fn unroll_event_name(name: &str) -> Vec<String> {
    if let Some((_, events)) = MODULE_EVENTS.iter().find(|(module, _)| *module == name) {
        events.iter().map(|s| s.to_string()).collect()
    } else {
        vec![name.to_string()]
    }
}

/// True if `event` is, or belongs to, `module_or_event` (used for
/// `isSubscribedTo` / `getChannelsSubscribedToEvent` matching).
fn event_matches(module_or_event: &str, event: &str) -> bool {
    if module_or_event == event {
        return true;
    }
    event.starts_with(module_or_event) && event[module_or_event.len()..].starts_with('.')
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    /// Empty = global (matches every top-level context).
    pub top_level_contexts: HashSet<String>,
    pub event_names: HashSet<String>,
    pub channel: Option<String>,
}

impl Subscription {
    fn is_global(&self) -> bool {
        self.top_level_contexts.is_empty()
    }

    fn matches_context(&self, top_level_context: &str) -> bool {
        self.is_global() || self.top_level_contexts.contains(top_level_context)
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionManager {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription, rejecting an empty event-name list
    /// and any unknown context id.
    pub fn subscribe(
        &mut self,
        event_names: &[String],
        context_ids: &[String],
        channel: Option<String>,
        contexts: &BrowsingContextStore,
    ) -> Result<Subscription, BidiError> {
        let unrolled: HashSet<String> = event_names.iter().flat_map(|n| unroll_event_name(n)).collect();
        if unrolled.is_empty() {
            return Err(BidiError::invalid_argument("subscribe requires at least one event name"));
        }
        let mut top_levels = HashSet::new();
        for ctx in context_ids {
            let top = contexts
                .find_top_level_context_id(ctx)
                .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {ctx}")))?;
            top_levels.insert(top);
        }
        let subscription = Subscription {
            id: Uuid::new_v4(),
            top_level_contexts: top_levels,
            event_names: unrolled,
            channel,
        };
        self.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    /// Attribute-based, atomic unsubscribe — splits
    /// subscriptions that partially overlap the request.
    pub fn unsubscribe(
        &mut self,
        event_names: &[String],
        context_ids: &[String],
        channel: Option<&str>,
        contexts: &BrowsingContextStore,
    ) -> Result<(), BidiError> {
        let requested_events: HashSet<String> = event_names.iter().flat_map(|n| unroll_event_name(n)).collect();
        let mut requested_top_levels = HashSet::new();
        for ctx in context_ids {
            let top = contexts
                .find_top_level_context_id(ctx)
                .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {ctx}")))?;
            requested_top_levels.insert(top);
        }
        let global_request = requested_top_levels.is_empty();

        let mut matched_events: HashSet<String> = HashSet::new();
        let mut matched_contexts: HashSet<String> = HashSet::new();
        let mut next: Vec<Subscription> = Vec::with_capacity(self.subscriptions.len());

        for sub in self.subscriptions.drain(..) {
            if sub.channel.as_deref() != channel {
                next.push(sub);
                continue;
            }
            let overlapping_events: HashSet<String> =
                sub.event_names.intersection(&requested_events).cloned().collect();
            if overlapping_events.is_empty() {
                next.push(sub);
                continue;
            }

            if global_request {
                if !sub.is_global() {
                    next.push(sub);
                    continue;
                }
                matched_events.extend(overlapping_events.iter().cloned());
                let remaining: HashSet<String> =
                    sub.event_names.difference(&overlapping_events).cloned().collect();
                if !remaining.is_empty() {
                    next.push(Subscription {
                        id: Uuid::new_v4(),
                        top_level_contexts: sub.top_level_contexts,
                        event_names: remaining,
                        channel: sub.channel,
                    });
                }
                continue;
            }

            let overlapping_contexts: HashSet<String> = if sub.is_global() {
                requested_top_levels.clone()
            } else {
                sub.top_level_contexts.intersection(&requested_top_levels).cloned().collect()
            };
            if overlapping_contexts.is_empty() {
                next.push(sub);
                continue;
            }

            matched_events.extend(overlapping_events.iter().cloned());
            matched_contexts.extend(overlapping_contexts.iter().cloned());

            // Split into one subscription per removed event, carrying the
            // remainder of the context set forward, plus one subscription
            // per event that wasn't touched at all (still full context set).
            let remaining_contexts: HashSet<String> = if sub.is_global() {
                HashSet::new()
            } else {
                sub.top_level_contexts.difference(&overlapping_contexts).cloned().collect()
            };
            for event in &overlapping_events {
                if !remaining_contexts.is_empty() {
                    next.push(Subscription {
                        id: Uuid::new_v4(),
                        top_level_contexts: remaining_contexts.clone(),
                        event_names: [event.clone()].into_iter().collect(),
                        channel: sub.channel.clone(),
                    });
                }
            }
            for event in sub.event_names.difference(&overlapping_events) {
                next.push(Subscription {
                    id: Uuid::new_v4(),
                    top_level_contexts: sub.top_level_contexts.clone(),
                    event_names: [event.clone()].into_iter().collect(),
                    channel: sub.channel.clone(),
                });
            }
        }

        let events_fully_matched = requested_events.is_subset(&matched_events);
        let contexts_fully_matched = global_request || requested_top_levels.is_subset(&matched_contexts);
        if !events_fully_matched || !contexts_fully_matched {
            return Err(BidiError::invalid_argument(
                "unsubscribe referenced an event or context with no matching subscription",
            ));
        }

        self.subscriptions = next;
        Ok(())
    }

    /// Channels subscribed to a given event over a given context, in
    /// registration order.
    pub fn get_channels_subscribed_to_event(&self, event_name: &str, context_id: &str) -> Vec<Option<String>> {
        let mut channels: Vec<Option<String>> = Vec::new();
        for sub in &self.subscriptions {
            if !sub.matches_context(context_id) {
                continue;
            }
            if sub.event_names.iter().any(|e| event_matches(e, event_name) || event_matches(event_name, e)) {
                if !channels.contains(&sub.channel) {
                    channels.push(sub.channel.clone());
                }
            }
        }
        channels
    }

    /// True if some subscription covers this event over this context.
    pub fn is_subscribed_to(&self, module_or_event: &str, context_id: &str) -> bool {
        self.subscriptions.iter().any(|sub| {
            sub.matches_context(context_id)
                && sub
                    .event_names
                    .iter()
                    .any(|e| event_matches(module_or_event, e) || event_matches(e, module_or_event))
        })
    }

    pub fn any_subscribed_to_module(&self, module: &str) -> bool {
        let prefix = format!("{module}.");
        self.subscriptions
            .iter()
            .any(|sub| sub.event_names.iter().any(|e| e.starts_with(&prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts_with(ids: &[&str]) -> BrowsingContextStore {
        let mut store = BrowsingContextStore::new();
        for id in ids {
            store.create_top_level(id.to_string(), None);
        }
        store
    }

    #[test]
    fn unroll_expands_module_to_atomic_events() {
        let events = unroll_event_name("network");
        assert!(events.contains(&"network.beforeRequestSent".to_string()));
        assert!(events.contains(&"network.fetchError".to_string()));
    }

    #[test]
    fn global_subscription_matches_every_context() {
        let contexts = contexts_with(&["ctx1"]);
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&["network".to_string()], &[], Some("A".to_string()), &contexts)
            .unwrap();
        assert!(mgr.is_subscribed_to("network.beforeRequestSent", "ctx1"));
        assert!(mgr.is_subscribed_to("network", "ctx1"));
    }

    #[test]
    fn subscribe_then_unsubscribe_same_args_restores_initial_state() {
        let contexts = contexts_with(&["ctx1"]);
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&["network".to_string()], &["ctx1".to_string()], Some("A".to_string()), &contexts)
            .unwrap();
        mgr.unsubscribe(&["network".to_string()], &["ctx1".to_string()], Some("A"), &contexts)
            .unwrap();
        assert!(!mgr.is_subscribed_to("network", "ctx1"));
    }

    #[test]
    fn splitting_leaves_other_events_subscribed_on_same_channel() {
        let contexts = contexts_with(&["ctx1"]);
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&["network".to_string()], &[], Some("A".to_string()), &contexts)
            .unwrap();
        mgr.unsubscribe(
            &["network.beforeRequestSent".to_string()],
            &[],
            Some("A"),
            &contexts,
        )
        .unwrap();
        assert!(!mgr.is_subscribed_to("network.beforeRequestSent", "ctx1"));
        assert!(mgr.is_subscribed_to("network.responseStarted", "ctx1"));

        // Unsubscribing something no longer present fails and leaves the
        // store unchanged.
        let before = format!("{:?}", mgr.subscriptions);
        let err = mgr
            .unsubscribe(&["network.beforeRequestSent".to_string()], &[], Some("A"), &contexts)
            .unwrap_err();
        assert_eq!(err.kind, crate::error::BidiErrorKind::InvalidArgument);
        assert_eq!(before, format!("{:?}", mgr.subscriptions));
    }
}
