//! The per-WebSocket-connection aggregate: one browser instance, one CDP
//! connection, and every shared store a command or CDP event handler needs.
//! A fresh instance of this struct is built per WS connection.

use std::collections::HashMap;
use std::sync::Arc;

use bidicdp_types::SessionId;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use uuid::Uuid;

use bidicdp_cdp::target::TargetId;

use crate::browsing_context::BrowsingContextStore;
use crate::cdp_target::CdpTarget;
use crate::conn::Connection;
use crate::config::Config;
use crate::error::BidiError;
use crate::events::{EventManager, OutgoingMessage};
use crate::network::NetworkStorage;
use crate::preload::PreloadScriptStore;
use crate::realm::RealmStore;
use crate::subscription::SubscriptionManager;

/// Normalized `unhandledPromptBehavior`, as negotiated by the session
/// processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnhandledPromptBehavior {
    pub default: crate::config::PromptBehavior,
}

/// Every store gets exactly one async-aware mutex, acquired by handlers for
/// the duration of a single idempotent mutation and never held across a CDP
/// round-trip's `.await`.
pub struct BidiSession {
    pub id: Uuid,
    pub config: Arc<Config>,
    pub conn: Arc<Connection>,
    pub contexts: Arc<AsyncMutex<BrowsingContextStore>>,
    pub realms: Arc<AsyncMutex<RealmStore>>,
    pub network: Arc<AsyncMutex<NetworkStorage>>,
    pub preload: Arc<AsyncMutex<PreloadScriptStore>>,
    pub subscriptions: Arc<AsyncMutex<SubscriptionManager>>,
    pub targets: Arc<AsyncMutex<HashMap<SessionId, CdpTarget>>>,
    pub events: Arc<EventManager>,
    pub accept_insecure_certs: bool,
    pub unhandled_prompt_behavior: SyncMutex<UnhandledPromptBehavior>,
    /// Channel-argument poll tasks started for a realm's preload scripts,
    /// keyed by realm id so realm destruction can abort them.
    pub script_pollers: Arc<AsyncMutex<HashMap<Uuid, Vec<tokio::task::JoinHandle<()>>>>>,
}

impl BidiSession {
    pub fn new(config: Arc<Config>, conn: Arc<Connection>, outgoing: mpsc::UnboundedSender<OutgoingMessage>) -> Self {
        let subscriptions = Arc::new(AsyncMutex::new(SubscriptionManager::new()));
        let contexts = Arc::new(AsyncMutex::new(BrowsingContextStore::new()));
        let events = Arc::new(EventManager::new(subscriptions.clone(), contexts.clone(), outgoing));
        Self {
            id: Uuid::new_v4(),
            accept_insecure_certs: config.accept_insecure_certs,
            unhandled_prompt_behavior: SyncMutex::new(UnhandledPromptBehavior { default: config.default_prompt_behavior() }),
            config,
            conn,
            contexts,
            realms: Arc::new(AsyncMutex::new(RealmStore::new())),
            network: Arc::new(AsyncMutex::new(NetworkStorage::new())),
            preload: Arc::new(AsyncMutex::new(PreloadScriptStore::new())),
            subscriptions,
            targets: Arc::new(AsyncMutex::new(HashMap::new())),
            events,
            script_pollers: Arc::new(AsyncMutex::new(HashMap::new())),
        }
    }

    /// Finds the CDP session id driving a given target, by linear scan of
    /// the attached-targets map (small: one entry per open tab/frame owner).
    pub async fn cdp_session_id_for_target(&self, target_id: &TargetId) -> Result<bidicdp_types::SessionId, BidiError> {
        self.targets
            .lock()
            .await
            .values()
            .find(|t| &t.target_id == target_id)
            .map(|t| t.session_id.clone())
            .ok_or_else(|| BidiError::no_such_frame(format!("no attached target for {}", target_id.0)))
    }
}
