//! Session domain processor: capability negotiation and
//! subscribe/unsubscribe.

use serde_json::{Map, Value};

use crate::config::PromptBehavior;
use crate::error::BidiError;
use crate::session::{BidiSession, UnhandledPromptBehavior};

pub async fn dispatch(session: &BidiSession, action: &str, params: Value, channel: Option<&str>) -> Result<Value, BidiError> {
    match action {
        "new" => new_session(session, params).await,
        "status" => Ok(serde_json::json!({ "ready": false, "message": "session already started" })),
        "end" => Ok(Value::Object(Map::new())),
        "subscribe" => subscribe(session, params, channel).await,
        "unsubscribe" => unsubscribe(session, params, channel).await,
        _ => Err(BidiError::unknown_command(format!("session.{action}"))),
    }
}

/// W3C `firstMatch` × `alwaysMatch` merge with conflict detection: picks the
/// first merged candidate naming `browserName == "chrome"`, else the first
/// candidate overall.
fn merge_capabilities(params: &Value) -> Result<Map<String, Value>, BidiError> {
    let capabilities = params.get("capabilities").cloned().unwrap_or(Value::Object(Map::new()));
    let always_match = capabilities
        .get("alwaysMatch")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let first_match = capabilities
        .get("firstMatch")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_else(|| vec![Value::Object(Map::new())]);

    if first_match.is_empty() {
        return Err(BidiError::invalid_argument("firstMatch must not be empty"));
    }

    let mut candidates = Vec::new();
    for entry in &first_match {
        let entry_obj = entry
            .as_object()
            .ok_or_else(|| BidiError::invalid_argument("firstMatch entries must be objects"))?;
        for (key, value) in entry_obj {
            if let Some(always_value) = always_match.get(key) {
                if always_value != value {
                    return Err(BidiError::invalid_argument(format!(
                        "capability {key} conflicts between alwaysMatch and firstMatch"
                    )));
                }
            }
        }
        let mut merged = always_match.clone();
        for (key, value) in entry_obj {
            merged.insert(key.clone(), value.clone());
        }
        candidates.push(merged);
    }

    candidates
        .iter()
        .find(|c| c.get("browserName").and_then(Value::as_str) == Some("chrome"))
        .or_else(|| candidates.first())
        .cloned()
        .ok_or_else(|| BidiError::session_not_created("no matching capabilities"))
}

fn normalize_unhandled_prompt_behavior(caps: &Map<String, Value>) -> PromptBehavior {
    match caps.get("unhandledPromptBehavior") {
        Some(Value::String(s)) => match s.as_str() {
            "accept" | "accept and notify" => PromptBehavior::Accept,
            "ignore" => PromptBehavior::Ignore,
            _ => PromptBehavior::Dismiss,
        },
        Some(Value::Object(obj)) => match obj.get("default").and_then(Value::as_str) {
            Some("accept") => PromptBehavior::Accept,
            Some("ignore") => PromptBehavior::Ignore,
            _ => PromptBehavior::Dismiss,
        },
        _ => PromptBehavior::default(),
    }
}

async fn new_session(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let merged = merge_capabilities(&params)?;
    let behavior = normalize_unhandled_prompt_behavior(&merged);
    *session.unhandled_prompt_behavior.lock() = UnhandledPromptBehavior { default: behavior };

    Ok(serde_json::json!({
        "sessionId": session.id.to_string(),
        "capabilities": {
            "browserName": "chrome",
            "browserVersion": "",
            "acceptInsecureCerts": session.accept_insecure_certs,
            "unhandledPromptBehavior": { "default": behavior.as_wire_str() },
        }
    }))
}

fn string_array(params: &Value, key: &str) -> Result<Vec<String>, BidiError> {
    match params.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| BidiError::invalid_argument(format!("{key} entries must be strings")))
            })
            .collect(),
        Some(_) => Err(BidiError::invalid_argument(format!("{key} must be an array"))),
    }
}

async fn subscribe(session: &BidiSession, params: Value, channel: Option<&str>) -> Result<Value, BidiError> {
    let events = string_array(&params, "events")?;
    let contexts = string_array(&params, "contexts")?;
    let contexts_guard = session.contexts.lock().await;
    let mut subs = session.subscriptions.lock().await;
    subs.subscribe(&events, &contexts, channel.map(str::to_string), &contexts_guard)?;
    drop(subs);
    drop(contexts_guard);
    session.events.refresh_network_domain_flag().await;
    Ok(Value::Object(Map::new()))
}

async fn unsubscribe(session: &BidiSession, params: Value, channel: Option<&str>) -> Result<Value, BidiError> {
    let events = string_array(&params, "events")?;
    let contexts = string_array(&params, "contexts")?;
    let contexts_guard = session.contexts.lock().await;
    let mut subs = session.subscriptions.lock().await;
    subs.unsubscribe(&events, &contexts, channel, &contexts_guard)?;
    drop(subs);
    drop(contexts_guard);
    session.events.refresh_network_domain_flag().await;
    Ok(Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_picks_chrome_candidate_when_present() {
        let params = serde_json::json!({
            "capabilities": {
                "alwaysMatch": {"acceptInsecureCerts": true},
                "firstMatch": [{"browserName": "firefox"}, {"browserName": "chrome"}]
            }
        });
        let merged = merge_capabilities(&params).unwrap();
        assert_eq!(merged.get("browserName").and_then(Value::as_str), Some("chrome"));
        assert_eq!(merged.get("acceptInsecureCerts").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn merge_detects_conflicting_capability() {
        let params = serde_json::json!({
            "capabilities": {
                "alwaysMatch": {"acceptInsecureCerts": true},
                "firstMatch": [{"acceptInsecureCerts": false}]
            }
        });
        assert!(merge_capabilities(&params).is_err());
    }

    #[test]
    fn normalize_accepts_legacy_string_form() {
        let mut caps = Map::new();
        caps.insert("unhandledPromptBehavior".into(), Value::String("accept".into()));
        assert_eq!(normalize_unhandled_prompt_behavior(&caps), PromptBehavior::Accept);
    }
}
