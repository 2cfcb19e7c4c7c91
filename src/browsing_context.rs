//! Browsing Context Store: the live tree of frames, keyed by BiDi context
//! id.

use std::collections::HashMap;

use bidicdp_cdp::target::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initial,
    DomContentLoaded,
    Load,
}

#[derive(Debug, Clone)]
pub struct BrowsingContext {
    pub id: String,
    pub parent: Option<String>,
    pub url: String,
    pub children: Vec<String>,
    pub lifecycle: LifecycleState,
    pub owning_target: TargetId,
    /// The CDP main-frame id backing a top-level context, learned from the
    /// first `Page.frameAttached`/`frameNavigated` seen on its target. `None`
    /// until then, and unused for child contexts (whose `id` already is a
    /// CDP frame id).
    pub main_frame_id: Option<String>,
}

impl BrowsingContext {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// Tree of frames, keyed by BiDi context id (which for this translator is
/// the CDP frame id, reused verbatim rather than minted fresh the way Realm
/// ids are).
#[derive(Debug, Default)]
pub struct BrowsingContextStore {
    contexts: HashMap<String, BrowsingContext>,
}

impl BrowsingContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_top_level(&mut self, id: String, owning_target: Option<TargetId>) {
        self.contexts.insert(
            id.clone(),
            BrowsingContext {
                id,
                parent: None,
                url: "about:blank".to_string(),
                children: Vec::new(),
                lifecycle: LifecycleState::Initial,
                owning_target: owning_target.unwrap_or(TargetId(String::new())),
                main_frame_id: None,
            },
        );
    }

    pub fn create_child(&mut self, id: String, parent: String, owning_target: TargetId) {
        if let Some(p) = self.contexts.get_mut(&parent) {
            p.children.push(id.clone());
        }
        self.contexts.insert(
            id.clone(),
            BrowsingContext {
                id,
                parent: Some(parent),
                url: "about:blank".to_string(),
                children: Vec::new(),
                lifecycle: LifecycleState::Initial,
                owning_target,
                main_frame_id: None,
            },
        );
    }

    /// Records the CDP main-frame id for a context once its first frame
    /// event arrives. A no-op if the context is unknown.
    pub fn set_main_frame_id(&mut self, context_id: &str, frame_id: String) {
        if let Some(ctx) = self.contexts.get_mut(context_id) {
            ctx.main_frame_id = Some(frame_id);
        }
    }

    /// Finds a context by a CDP frame id: direct id match for child
    /// contexts (keyed by frame id already), or `main_frame_id` for
    /// top-level contexts (keyed by target id instead).
    pub fn find_by_frame_id(&self, frame_id: &str) -> Option<&BrowsingContext> {
        self.contexts
            .get(frame_id)
            .or_else(|| self.contexts.values().find(|c| c.main_frame_id.as_deref() == Some(frame_id)))
    }

    pub fn get(&self, id: &str) -> Option<&BrowsingContext> {
        self.contexts.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut BrowsingContext> {
        self.contexts.get_mut(id)
    }

    /// Destroys a context and cascades to every descendant (their CDP
    /// sessions detach on their own; this just keeps the tree consistent).
    pub fn destroy(&mut self, id: &str) -> Vec<BrowsingContext> {
        let mut removed = Vec::new();
        let children = self.contexts.get(id).map(|c| c.children.clone()).unwrap_or_default();
        for child in children {
            removed.extend(self.destroy(&child));
        }
        if let Some(ctx) = self.contexts.remove(id) {
            if let Some(parent) = ctx.parent.clone() {
                if let Some(p) = self.contexts.get_mut(&parent) {
                    p.children.retain(|c| c != id);
                }
            }
            removed.push(ctx);
        }
        removed
    }

    /// Walks parents until `parent == None`. Total for any known id,
    /// idempotent on an already-top-level id.
    pub fn find_top_level_context_id(&self, id: &str) -> Option<String> {
        let mut current = self.contexts.get(id)?;
        while let Some(parent_id) = &current.parent {
            current = self.contexts.get(parent_id)?;
        }
        Some(current.id.clone())
    }

    pub fn top_level_contexts(&self) -> impl Iterator<Item = &BrowsingContext> {
        self.contexts.values().filter(|c| c.is_top_level())
    }

    pub fn all(&self) -> impl Iterator<Item = &BrowsingContext> {
        self.contexts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_top_level_is_total_and_idempotent() {
        let mut store = BrowsingContextStore::new();
        store.create_top_level("top".into(), None);
        store.create_child("child".into(), "top".into(), TargetId("t".into()));
        store.create_child("grandchild".into(), "child".into(), TargetId("t".into()));

        assert_eq!(store.find_top_level_context_id("grandchild").as_deref(), Some("top"));
        assert_eq!(store.find_top_level_context_id("top").as_deref(), Some("top"));
        assert_eq!(store.find_top_level_context_id("missing"), None);
    }

    #[test]
    fn destroy_cascades_to_children() {
        let mut store = BrowsingContextStore::new();
        store.create_top_level("top".into(), None);
        store.create_child("child".into(), "top".into(), TargetId("t".into()));
        let removed = store.destroy("top");
        assert_eq!(removed.len(), 2);
        assert!(store.get("child").is_none());
    }
}
