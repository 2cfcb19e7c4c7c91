//! Preload Script Store: scripts to run on every new document, installed
//! on matching targets as they attach.

use std::collections::HashMap;

use bidicdp_cdp::page;
use bidicdp_cdp::target::TargetId;
use tracing::warn;
use uuid::Uuid;

use crate::conn::Connection;
use crate::error::CdpError;

#[derive(Debug, Clone)]
pub struct PreloadScript {
    pub id: Uuid,
    pub function_declaration: String,
    pub sandbox: Option<String>,
    /// Empty = applies to every target.
    pub user_contexts: Vec<String>,
    pub channels: Vec<String>,
}

/// Unique `window` property under which the queue object for one
/// `(script, channel)` pair lives, JSON-escaped so arbitrary channel text
/// is safe to splice into a property accessor.
fn queue_key(script_id: Uuid, channel: &str) -> String {
    serde_json::to_string(&format!("__bidiChannel_{}_{channel}", script_id.simple())).expect("string always serializes")
}

/// The JS expression a host-side poller evaluates to fetch the queue
/// object's remote handle.
pub fn queue_accessor(script_id: Uuid, channel: &str) -> String {
    format!("window[{}]", queue_key(script_id, channel))
}

/// Wraps a preload script's function declaration so it receives one queue
/// argument per declared channel, each shaped `{getMessage, sendMessage}`:
/// `sendMessage` enqueues, `getMessage` returns a promise that resolves
/// with the next queued value (or immediately, if one is already
/// buffered). The poller on the host side resolves that promise via
/// `Runtime.callFunctionOn(awaitPromise=true)`.
fn wrap_with_channels(function_declaration: &str, script_id: Uuid, channels: &[String]) -> String {
    if channels.is_empty() {
        return function_declaration.to_string();
    }
    let mut setup = String::new();
    let mut args = String::new();
    for channel in channels {
        let key = queue_key(script_id, channel);
        setup.push_str(&format!(
            "window[{key}] = window[{key}] || (function() {{ \
                var buffer = []; var resolvers = []; \
                return {{ \
                    sendMessage: function(data) {{ \
                        if (resolvers.length) {{ resolvers.shift()(data); }} else {{ buffer.push(data); }} \
                    }}, \
                    getMessage: function() {{ \
                        return new Promise(function(resolve) {{ \
                            if (buffer.length) {{ resolve(buffer.shift()); }} else {{ resolvers.push(resolve); }} \
                        }}); \
                    }} \
                }}; \
            }})();"
        ));
        args.push_str(&format!("window[{key}],"));
    }
    format!("(function() {{ {setup} return ({function_declaration}).apply(null, [{args}]); }})()")
}

/// Every CDP-side installation of a single [`PreloadScript`], one per
/// target it was pushed to.
#[derive(Debug, Default)]
struct Installations {
    by_target: HashMap<TargetId, String>,
}

#[derive(Debug, Default)]
pub struct PreloadScriptStore {
    scripts: HashMap<Uuid, PreloadScript>,
    installations: HashMap<Uuid, Installations>,
}

impl PreloadScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `addPreloadScript` — records the script; installation on
    /// already-running targets is the caller's responsibility (the domain
    /// processor walks live targets and calls [`Self::install_on_target`] for
    /// each).
    pub fn add(&mut self, function_declaration: String, sandbox: Option<String>, user_contexts: Vec<String>, channels: Vec<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.scripts.insert(
            id,
            PreloadScript {
                id,
                function_declaration,
                sandbox,
                user_contexts,
                channels,
            },
        );
        self.installations.insert(id, Installations::default());
        id
    }

    /// `removePreloadScript` — sweeps every CDP id recorded for this BiDi
    /// id and issues `Page.removeScriptToEvaluateOnNewDocument` on each
    /// target that still has it installed.
    pub async fn remove(&mut self, id: Uuid, conn: &Connection) -> Result<(), CdpError> {
        self.scripts.remove(&id);
        if let Some(installs) = self.installations.remove(&id) {
            for (target, identifier) in installs.by_target {
                let result = conn
                    .execute(
                        Some(target.0.as_str()),
                        page::RemoveScriptToEvaluateOnNewDocumentParams { identifier },
                    )
                    .await;
                if let Err(err) = result {
                    if !err.is_close_error() {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    fn scripts_in_scope(&self, user_context: &str) -> Vec<&PreloadScript> {
        self.scripts
            .values()
            .filter(|s| s.user_contexts.is_empty() || s.user_contexts.iter().any(|c| c == user_context))
            .collect()
    }

    /// `(script id, channels)` for every in-scope script that declared at
    /// least one channel — the set a freshly created realm needs a poller
    /// started for.
    pub fn scripts_with_channels_in_scope(&self, user_context: &str) -> Vec<(Uuid, Vec<String>)> {
        self.scripts_in_scope(user_context)
            .into_iter()
            .filter(|s| !s.channels.is_empty())
            .map(|s| (s.id, s.channels.clone()))
            .collect()
    }

    /// Installs one freshly added script on every target it's in scope for
    /// (`addPreloadScript` against already-running targets).
    pub async fn install_on_existing_targets(
        &mut self,
        id: Uuid,
        conn: &Connection,
        targets: impl Iterator<Item = (TargetId, String, String)>,
    ) -> Result<(), CdpError> {
        let script = match self.scripts.get(&id) {
            Some(s) => s.clone(),
            None => return Ok(()),
        };
        for (target, session_id, user_context) in targets {
            if !(script.user_contexts.is_empty() || script.user_contexts.iter().any(|c| c == &user_context)) {
                continue;
            }
            let result = conn
                .execute(
                    Some(session_id.as_str()),
                    page::AddScriptToEvaluateOnNewDocumentParams {
                        source: wrap_with_channels(&script.function_declaration, script.id, &script.channels),
                        world_name: script.sandbox.clone(),
                        run_immediately: Some(true),
                    },
                )
                .await;
            match result {
                Ok(resp) => {
                    self.installations
                        .entry(id)
                        .or_default()
                        .by_target
                        .insert(target, resp.identifier);
                }
                Err(err) if err.is_close_error() => {
                    warn!(target = %target.0, "target closed while installing preload script");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Installs every in-scope preload script on a freshly attached target
    /// `user_context` identifies the target's owning
    /// browser context (or `"default"` when there is none).
    pub async fn install_on_target(
        &mut self,
        target: &TargetId,
        session_id: &str,
        user_context: &str,
        conn: &Connection,
    ) -> Result<(), CdpError> {
        let ids: Vec<Uuid> = self.scripts_in_scope(user_context).into_iter().map(|s| s.id).collect();
        for id in ids {
            let script = match self.scripts.get(&id) {
                Some(s) => s.clone(),
                None => continue,
            };
            let result = conn
                .execute(
                    Some(session_id),
                    page::AddScriptToEvaluateOnNewDocumentParams {
                        source: wrap_with_channels(&script.function_declaration, script.id, &script.channels),
                        world_name: script.sandbox.clone(),
                        run_immediately: Some(true),
                    },
                )
                .await;
            match result {
                Ok(resp) => {
                    self.installations
                        .entry(id)
                        .or_default()
                        .by_target
                        .insert(target.clone(), resp.identifier);
                }
                Err(err) if err.is_close_error() => {
                    warn!(target = %target.0, "target closed while installing preload script");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<&PreloadScript> {
        self.scripts.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &PreloadScript> {
        self.scripts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_in_scope_respects_user_context_filter() {
        let mut store = PreloadScriptStore::new();
        let global = store.add("() => {}".into(), None, vec![], vec![]);
        let scoped = store.add("() => {}".into(), None, vec!["uc1".into()], vec![]);

        let in_scope: Vec<Uuid> = store.scripts_in_scope("uc1").into_iter().map(|s| s.id).collect();
        assert!(in_scope.contains(&global));
        assert!(in_scope.contains(&scoped));

        let in_scope_other: Vec<Uuid> = store.scripts_in_scope("uc2").into_iter().map(|s| s.id).collect();
        assert!(in_scope_other.contains(&global));
        assert!(!in_scope_other.contains(&scoped));
    }

    #[test]
    fn scripts_with_channels_in_scope_skips_channel_free_scripts() {
        let mut store = PreloadScriptStore::new();
        let plain = store.add("() => {}".into(), None, vec![], vec![]);
        let wired = store.add("() => {}".into(), None, vec![], vec!["c1".into(), "c2".into()]);

        let with_channels = store.scripts_with_channels_in_scope("default");
        assert_eq!(with_channels.len(), 1);
        assert_eq!(with_channels[0].0, wired);
        assert_eq!(with_channels[0].1, vec!["c1".to_string(), "c2".to_string()]);
        assert!(!with_channels.iter().any(|(id, _)| *id == plain));
    }

    #[test]
    fn wrap_with_channels_is_identity_without_channels() {
        let id = Uuid::new_v4();
        assert_eq!(wrap_with_channels("() => 1", id, &[]), "() => 1");
    }

    #[test]
    fn wrap_with_channels_passes_one_queue_argument_per_channel() {
        let id = Uuid::new_v4();
        let wrapped = wrap_with_channels("(a, b) => {}", id, &["c1".to_string(), "c2".to_string()]);
        assert!(wrapped.contains("getMessage"));
        assert!(wrapped.contains("sendMessage"));
        assert!(wrapped.contains(&queue_key(id, "c1")));
        assert!(wrapped.contains(&queue_key(id, "c2")));
        assert!(wrapped.contains(".apply(null,"));
    }
}
