//! Network Storage: live requests keyed by CDP request id, intercept
//! definitions, and pre-request pause records.

use std::collections::HashMap;

use bidicdp_cdp::fetch::RequestStage;
use bidicdp_cdp::network::RequestId;
use bidicdp_types::SessionId;
use fnv::FnvHashMap;
use uuid::Uuid;

use super::request::NetworkRequest;

#[derive(Debug, Clone)]
pub struct Intercept {
    pub id: Uuid,
    pub url_patterns: Vec<String>,
    pub phases: Vec<RequestStage>,
    pub contexts: Vec<String>,
}

impl Intercept {
    fn matches_phase(&self, phase: RequestStage) -> bool {
        self.phases.contains(&phase)
    }

    fn matches_url(&self, url: &str) -> bool {
        self.url_patterns.is_empty() || self.url_patterns.iter().any(|p| url_pattern_matches(p, url))
    }

    fn matches_context(&self, context: Option<&str>) -> bool {
        self.contexts.is_empty() || context.map(|c| self.contexts.iter().any(|x| x == c)).unwrap_or(false)
    }
}

/// A minimal glob: `*` matches any run of characters, everything else is
/// literal. CDP/BiDi URL patterns in practice are exactly this subset.
fn url_pattern_matches(pattern: &str, url: &str) -> bool {
    let mut parts = pattern.split('*').peekable();
    let mut rest = url;
    let mut first = true;
    while let Some(part) = parts.next() {
        if part.is_empty() {
            first = false;
            continue;
        }
        if first {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if parts.peek().is_none() {
            return rest.ends_with(part);
        } else if let Some(idx) = rest.find(part) {
            rest = &rest[idx + part.len()..];
        } else {
            return false;
        }
        first = false;
    }
    true
}

/// A `Fetch.requestPaused` or `Fetch.authRequired` payload observed before
/// the matching `Network.requestWillBeSent` arrived, keyed by CDP network
/// id.
#[derive(Debug, Clone)]
pub struct PendingPauseRecord {
    pub fetch_id: Option<String>,
    pub is_response_phase: bool,
    pub session: SessionId,
}

#[derive(Debug, Default)]
pub struct NetworkStorage {
    requests: FnvHashMap<RequestId, (NetworkRequest, SessionId)>,
    intercepts: HashMap<Uuid, Intercept>,
    pending_pauses: HashMap<RequestId, PendingPauseRecord>,
}

impl NetworkStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, id: RequestId, session: SessionId) -> &mut NetworkRequest {
        &mut self
            .requests
            .entry(id.clone())
            .or_insert_with(|| (NetworkRequest::new(id), session))
            .0
    }

    pub fn get(&self, id: &RequestId) -> Option<&NetworkRequest> {
        self.requests.get(id).map(|(r, _)| r)
    }

    pub fn get_mut(&mut self, id: &RequestId) -> Option<&mut NetworkRequest> {
        self.requests.get_mut(id).map(|(r, _)| r)
    }

    pub fn remove(&mut self, id: &RequestId) -> Option<NetworkRequest> {
        self.requests.remove(id).map(|(r, _)| r)
    }

    pub fn session_for(&self, id: &RequestId) -> Option<SessionId> {
        self.requests.get(id).map(|(_, s)| s.clone())
    }

    /// Replaces a request with the fresh redirect successor, same id.
    pub fn replace_with_redirect(&mut self, id: &RequestId, session: SessionId, fresh: NetworkRequest) {
        self.requests.insert(id.clone(), (fresh, session));
    }

    pub fn add_intercept(&mut self, url_patterns: Vec<String>, phases: Vec<RequestStage>, contexts: Vec<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.intercepts.insert(id, Intercept { id, url_patterns, phases, contexts });
        id
    }

    pub fn remove_intercept(&mut self, id: &Uuid) -> bool {
        self.intercepts.remove(id).is_some()
    }

    /// Intercepts active for a URL/context pair in a given phase.
    pub fn get_intercepts_for_phase(&self, url: &str, context: Option<&str>, phase: RequestStage) -> Vec<&Intercept> {
        self.intercepts
            .values()
            .filter(|i| i.matches_phase(phase) && i.matches_url(url) && i.matches_context(context))
            .collect()
    }

    pub fn has_active_intercept_for_phase(&self, url: &str, context: Option<&str>, phase: RequestStage) -> bool {
        !self.get_intercepts_for_phase(url, context, phase).is_empty()
    }

    pub fn record_pending_pause(&mut self, network_id: RequestId, record: PendingPauseRecord) {
        self.pending_pauses.insert(network_id, record);
    }

    pub fn take_pending_pause(&mut self, network_id: &RequestId) -> Option<PendingPauseRecord> {
        self.pending_pauses.remove(network_id)
    }

    /// Drops every live request and pending record belonging to a detached
    /// CDP session.
    pub fn clear_session(&mut self, session: &SessionId) {
        self.requests.retain(|_, (_, s)| s != session);
        self.pending_pauses.retain(|_, record| &record.session != session);
    }

    pub fn live_requests(&self) -> impl Iterator<Item = &NetworkRequest> {
        self.requests.values().map(|(r, _)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_pattern_matching_supports_prefix_suffix_and_wildcard() {
        assert!(url_pattern_matches("https://example.test/*", "https://example.test/a/b"));
        assert!(url_pattern_matches("*.png", "https://example.test/a.png"));
        assert!(url_pattern_matches("https://example.test/*.png", "https://example.test/x/y.png"));
        assert!(!url_pattern_matches("https://example.test/*.png", "https://example.test/x/y.jpg"));
    }

    #[test]
    fn clear_session_drops_only_that_sessions_requests() {
        let mut storage = NetworkStorage::new();
        storage.get_or_create(RequestId("r1".into()), SessionId("s1".into()));
        storage.get_or_create(RequestId("r2".into()), SessionId("s2".into()));
        storage.clear_session(&SessionId("s1".into()));
        assert!(storage.get(&RequestId("r1".into())).is_none());
        assert!(storage.get(&RequestId("r2".into())).is_some());
    }

    #[test]
    fn clear_session_drops_only_that_sessions_pending_pauses() {
        let mut storage = NetworkStorage::new();
        storage.record_pending_pause(
            RequestId("r1".into()),
            PendingPauseRecord { fetch_id: Some("f1".into()), is_response_phase: false, session: SessionId("s1".into()) },
        );
        storage.record_pending_pause(
            RequestId("r2".into()),
            PendingPauseRecord { fetch_id: Some("f2".into()), is_response_phase: false, session: SessionId("s2".into()) },
        );
        storage.clear_session(&SessionId("s1".into()));
        assert!(storage.take_pending_pause(&RequestId("r1".into())).is_none());
        assert!(storage.take_pending_pause(&RequestId("r2".into())).is_some());
    }

    #[test]
    fn get_intercepts_for_phase_filters_by_phase_and_url() {
        let mut storage = NetworkStorage::new();
        storage.add_intercept(vec!["https://a.test/*".into()], vec![RequestStage::Request], vec![]);
        storage.add_intercept(vec![], vec![RequestStage::Response], vec![]);
        let matches = storage.get_intercepts_for_phase("https://a.test/x", None, RequestStage::Request);
        assert_eq!(matches.len(), 1);
        let matches = storage.get_intercepts_for_phase("https://b.test/x", None, RequestStage::Request);
        assert!(matches.is_empty());
    }
}
