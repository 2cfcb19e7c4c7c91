//! Realm Store: tracks every JavaScript execution realm (window, worker,
//! sandbox) by a stable BiDi id, indexed secondarily by the CDP session and
//! execution context that backs it.

use std::collections::HashMap;

use bidicdp_cdp::runtime::ExecutionContextId;
use bidicdp_types::SessionId;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealmType {
    Window,
    DedicatedWorker { owner: String },
    SharedWorker,
    ServiceWorker,
    Sandbox { name: String },
}

#[derive(Debug, Clone)]
pub struct Realm {
    pub id: Uuid,
    pub realm_type: RealmType,
    pub cdp_session: SessionId,
    pub execution_context_id: ExecutionContextId,
    pub origin: String,
    /// For window/sandbox realms, the single owning context; for worker
    /// realms, every browsing context that currently holds a reference.
    pub associated_browsing_contexts: Vec<String>,
}

/// Matches the BiDi `script.RealmInfo` filter shape used by
/// `script.getRealms` and by the interception/evaluation call sites.
#[derive(Debug, Default, Clone)]
pub struct RealmFilter {
    pub realm_id: Option<Uuid>,
    pub browsing_context_id: Option<String>,
    pub realm_type: Option<&'static str>,
}

#[derive(Debug, Default)]
pub struct RealmStore {
    by_id: HashMap<Uuid, Realm>,
    by_cdp: HashMap<(SessionId, ExecutionContextId), Uuid>,
}

impl RealmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, realm: Realm) -> Uuid {
        let id = realm.id;
        self.by_cdp
            .insert((realm.cdp_session.clone(), realm.execution_context_id), id);
        self.by_id.insert(id, realm);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&Realm> {
        self.by_id.get(id)
    }

    pub fn by_cdp_context(&self, session: &SessionId, ctx: ExecutionContextId) -> Option<&Realm> {
        self.by_cdp.get(&(session.clone(), ctx)).and_then(|id| self.by_id.get(id))
    }

    /// Removes the realm for a destroyed execution context, returning it so
    /// the caller can emit `script.realmDestroyed`.
    pub fn remove_by_cdp_context(&mut self, session: &SessionId, ctx: ExecutionContextId) -> Option<Realm> {
        let id = self.by_cdp.remove(&(session.clone(), ctx))?;
        self.by_id.remove(&id)
    }

    /// Drops every realm belonging to a CDP session (session detached).
    pub fn remove_session(&mut self, session: &SessionId) -> Vec<Realm> {
        let ids: Vec<Uuid> = self
            .by_id
            .values()
            .filter(|r| &r.cdp_session == session)
            .map(|r| r.id)
            .collect();
        let mut removed = Vec::new();
        for id in ids {
            self.by_cdp.retain(|_, v| *v != id);
            if let Some(realm) = self.by_id.remove(&id) {
                removed.push(realm);
            }
        }
        removed
    }

    pub fn find(&self, filter: &RealmFilter) -> Option<&Realm> {
        self.by_id.values().find(|r| self.matches(r, filter))
    }

    pub fn find_all(&self, filter: &RealmFilter) -> Vec<&Realm> {
        self.by_id.values().filter(|r| self.matches(r, filter)).collect()
    }

    fn matches(&self, realm: &Realm, filter: &RealmFilter) -> bool {
        if let Some(id) = filter.realm_id {
            if realm.id != id {
                return false;
            }
        }
        if let Some(ctx) = &filter.browsing_context_id {
            if !realm.associated_browsing_contexts.iter().any(|c| c == ctx) {
                return false;
            }
        }
        if let Some(ty) = filter.realm_type {
            let matches_type = match (&realm.realm_type, ty) {
                (RealmType::Window, "window") => true,
                (RealmType::DedicatedWorker { .. }, "dedicated-worker") => true,
                (RealmType::SharedWorker, "shared-worker") => true,
                (RealmType::ServiceWorker, "service-worker") => true,
                (RealmType::Sandbox { .. }, "sandbox") => true,
                _ => false,
            };
            if !matches_type {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm(id: Uuid, session: &str, ctx: i64, ctxs: &[&str]) -> Realm {
        Realm {
            id,
            realm_type: RealmType::Window,
            cdp_session: SessionId(session.to_string()),
            execution_context_id: ExecutionContextId(ctx),
            origin: "https://example.test".into(),
            associated_browsing_contexts: ctxs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn cdp_pair_maps_to_at_most_one_realm() {
        let mut store = RealmStore::new();
        let id1 = Uuid::new_v4();
        store.insert(realm(id1, "s1", 1, &["ctx1"]));
        assert!(store.by_cdp_context(&SessionId("s1".into()), ExecutionContextId(1)).is_some());

        let removed = store.remove_by_cdp_context(&SessionId("s1".into()), ExecutionContextId(1));
        assert!(removed.is_some());
        assert!(store.by_cdp_context(&SessionId("s1".into()), ExecutionContextId(1)).is_none());
    }

    #[test]
    fn remove_session_drops_every_realm_for_that_session() {
        let mut store = RealmStore::new();
        store.insert(realm(Uuid::new_v4(), "s1", 1, &["ctx1"]));
        store.insert(realm(Uuid::new_v4(), "s1", 2, &["ctx1"]));
        store.insert(realm(Uuid::new_v4(), "s2", 1, &["ctx2"]));
        let removed = store.remove_session(&SessionId("s1".into()));
        assert_eq!(removed.len(), 2);
        assert!(store.by_cdp_context(&SessionId("s2".into()), ExecutionContextId(1)).is_some());
    }
}
