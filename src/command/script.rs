//! Script domain processor: `addPreloadScript`, `removePreloadScript`,
//! `callFunction`, `evaluate`, `disown`, `getRealms`.

use bidicdp_cdp::{dom, runtime};
use serde_json::Value;
use uuid::Uuid;

use crate::error::BidiError;
use crate::realm::RealmFilter;
use crate::session::BidiSession;
use crate::shared_id::parse_shared_id;

pub async fn dispatch(session: &BidiSession, action: &str, params: Value) -> Result<Value, BidiError> {
    match action {
        "addPreloadScript" => add_preload_script(session, params).await,
        "removePreloadScript" => remove_preload_script(session, params).await,
        "callFunction" => call_function(session, params).await,
        "evaluate" => evaluate(session, params).await,
        "disown" => disown(session, params).await,
        "getRealms" => get_realms(session, params).await,
        _ => Err(BidiError::unknown_command(format!("script.{action}"))),
    }
}

fn string_list(params: &Value, key: &str) -> Result<Vec<String>, BidiError> {
    match params.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| BidiError::invalid_argument(format!("{key} entries must be strings"))))
            .collect(),
        Some(_) => Err(BidiError::invalid_argument(format!("{key} must be an array"))),
    }
}

/// Resolves the explicit `contexts` list to top-level ids, or every
/// currently open top-level context when omitted. An explicit-but-empty
/// list is rejected rather than silently installing nowhere.
async fn resolve_target_contexts(session: &BidiSession, params: &Value) -> Result<Vec<String>, BidiError> {
    match params.get("contexts") {
        None => {
            let contexts = session.contexts.lock().await;
            Ok(contexts.top_level_contexts().map(|c| c.id.clone()).collect())
        }
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(BidiError::invalid_argument("contexts must not be empty when provided"));
            }
            let contexts = session.contexts.lock().await;
            items
                .iter()
                .map(|v| {
                    let id = v.as_str().ok_or_else(|| BidiError::invalid_argument("contexts entries must be strings"))?;
                    let ctx = contexts.get(id).ok_or_else(|| BidiError::no_such_frame(format!("no such context: {id}")))?;
                    if !ctx.is_top_level() {
                        return Err(BidiError::invalid_argument(format!("{id} is not a top-level context")));
                    }
                    Ok(id.to_string())
                })
                .collect()
        }
        Some(_) => Err(BidiError::invalid_argument("contexts must be an array")),
    }
}

/// A declared channel argument, `{type: "channel", value: {channel: "<id>", ...}}`.
fn parse_channels(params: &Value) -> Result<Vec<String>, BidiError> {
    match params.get("arguments") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let ty = item.get("type").and_then(Value::as_str);
                if ty != Some("channel") {
                    return Err(BidiError::invalid_argument("preload script arguments must be channel values"));
                }
                item.get("value")
                    .and_then(|v| v.get("channel"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| BidiError::invalid_argument("channel argument missing value.channel"))
            })
            .collect(),
        Some(_) => Err(BidiError::invalid_argument("arguments must be an array")),
    }
}

async fn add_preload_script(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let function_declaration = params
        .get("functionDeclaration")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing functionDeclaration"))?
        .to_string();
    let sandbox = params.get("sandbox").and_then(Value::as_str).map(str::to_string);
    let channels = parse_channels(&params)?;
    let user_contexts = resolve_target_contexts(session, &params).await.unwrap_or_default();

    let id = {
        let mut preload = session.preload.lock().await;
        preload.add(function_declaration, sandbox, user_contexts, channels)
    };

    let targets: Vec<(bidicdp_cdp::target::TargetId, String, String)> = session
        .targets
        .lock()
        .await
        .values()
        .map(|t| (t.target_id.clone(), t.session_id.0.clone(), t.user_context.clone()))
        .collect();
    session
        .preload
        .lock()
        .await
        .install_on_existing_targets(id, &session.conn, targets.into_iter())
        .await?;

    Ok(serde_json::json!({ "script": id.to_string() }))
}

async fn remove_preload_script(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let id_str = params
        .get("script")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing script"))?;
    let id = Uuid::parse_str(id_str).map_err(|_| BidiError::no_such_script(format!("no such script: {id_str}")))?;
    if session.preload.lock().await.get(&id).is_none() {
        return Err(BidiError::no_such_script(format!("no such script: {id_str}")));
    }
    session.preload.lock().await.remove(id, &session.conn).await?;
    Ok(Value::Object(Default::default()))
}

fn realm_filter_from_params(params: &Value) -> Result<RealmFilter, BidiError> {
    let realm_id = params
        .get("target")
        .and_then(|t| t.get("realm"))
        .and_then(Value::as_str)
        .map(|s| Uuid::parse_str(s).map_err(|_| BidiError::no_such_script(format!("no such realm: {s}"))))
        .transpose()?;
    let browsing_context_id = params
        .get("target")
        .and_then(|t| t.get("context"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(RealmFilter { realm_id, browsing_context_id, realm_type: None })
}

pub(crate) fn remote_object_to_value(obj: &runtime::RemoteObject) -> Value {
    serde_json::json!({
        "type": obj.object_type,
        "value": obj.value,
        "objectId": obj.object_id,
    })
}

async fn resolve_argument(session: &BidiSession, arg: &Value, execution_context_id: runtime::ExecutionContextId, cdp_session: &str) -> Result<Value, BidiError> {
    if let Some(shared_id) = arg.get("sharedId").and_then(Value::as_str) {
        let parsed = parse_shared_id(shared_id).ok_or_else(|| BidiError::no_such_node(format!("malformed sharedId: {shared_id}")))?;
        let resp = session
            .conn
            .execute(
                Some(cdp_session),
                dom::ResolveNodeParams {
                    backend_node_id: dom::BackendNodeId(parsed.backend_node_id),
                    object_group: None,
                    execution_context_id: Some(execution_context_id.0),
                },
            )
            .await?;
        return Ok(serde_json::json!({ "objectId": resp.object.object_id }));
    }
    if let Some(value) = arg.get("value") {
        return Ok(serde_json::json!({ "value": value }));
    }
    Err(BidiError::invalid_argument("argument must carry either value or sharedId"))
}

async fn call_function(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let function_declaration = params
        .get("functionDeclaration")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing functionDeclaration"))?
        .to_string();
    let await_promise = params.get("awaitPromise").and_then(Value::as_bool);
    let filter = realm_filter_from_params(&params)?;

    let (cdp_session, execution_context_id) = {
        let realms = session.realms.lock().await;
        let realm = realms.find(&filter).ok_or_else(|| BidiError::no_such_script("no realm matches target"))?;
        (realm.cdp_session.clone(), realm.execution_context_id)
    };

    let mut arguments = Vec::new();
    if let Some(Value::Array(items)) = params.get("arguments") {
        for item in items {
            arguments.push(resolve_argument(session, item, execution_context_id, cdp_session.0.as_str()).await?);
        }
    }

    let resp = session
        .conn
        .execute(
            Some(cdp_session.0.as_str()),
            runtime::CallFunctionOnParams {
                function_declaration,
                execution_context_id: Some(execution_context_id),
                object_id: None,
                arguments: Some(arguments),
                await_promise,
                return_by_value: Some(false),
            },
        )
        .await?;

    if let Some(exception) = resp.exception_details {
        return Ok(serde_json::json!({ "type": "exception", "exceptionDetails": exception }));
    }
    Ok(serde_json::json!({ "type": "success", "result": remote_object_to_value(&resp.result) }))
}

async fn evaluate(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let expression = params
        .get("expression")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing expression"))?
        .to_string();
    let await_promise = params.get("awaitPromise").and_then(Value::as_bool);
    let filter = realm_filter_from_params(&params)?;

    let (cdp_session, execution_context_id) = {
        let realms = session.realms.lock().await;
        let realm = realms.find(&filter).ok_or_else(|| BidiError::no_such_script("no realm matches target"))?;
        (realm.cdp_session.clone(), realm.execution_context_id)
    };

    let resp = session
        .conn
        .execute(
            Some(cdp_session.0.as_str()),
            runtime::EvaluateParams {
                expression,
                context_id: Some(execution_context_id),
                await_promise,
                return_by_value: Some(false),
            },
        )
        .await?;

    if let Some(exception) = resp.exception_details {
        return Ok(serde_json::json!({ "type": "exception", "exceptionDetails": exception }));
    }
    Ok(serde_json::json!({ "type": "success", "result": remote_object_to_value(&resp.result) }))
}

async fn disown(_session: &BidiSession, _params: Value) -> Result<Value, BidiError> {
    // `Runtime.releaseObject` is intentionally not wired: remote objects
    // handed out by this translator are scoped to their realm's lifetime and
    // released when the realm itself is torn down.
    Ok(Value::Object(Default::default()))
}

async fn get_realms(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let filter = realm_filter_from_params(&params)?;
    let realms = session.realms.lock().await;
    let found = realms.find_all(&filter);
    let out: Vec<Value> = found
        .iter()
        .map(|r| {
            serde_json::json!({
                "realm": r.id.to_string(),
                "origin": r.origin,
                "type": realm_type_wire(&r.realm_type),
                "context": r.associated_browsing_contexts.first(),
            })
        })
        .collect();
    Ok(serde_json::json!({ "realms": out }))
}

fn realm_type_wire(ty: &crate::realm::RealmType) -> &'static str {
    match ty {
        crate::realm::RealmType::Window => "window",
        crate::realm::RealmType::DedicatedWorker { .. } => "dedicated-worker",
        crate::realm::RealmType::SharedWorker => "shared-worker",
        crate::realm::RealmType::ServiceWorker => "service-worker",
        crate::realm::RealmType::Sandbox { .. } => "sandbox",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_channels_reads_channel_values_from_arguments() {
        let params = serde_json::json!({
            "arguments": [
                { "type": "channel", "value": { "channel": "c1" } },
                { "type": "channel", "value": { "channel": "c2", "ownership": "root" } },
            ]
        });
        assert_eq!(parse_channels(&params).unwrap(), vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn parse_channels_defaults_to_empty_without_arguments() {
        assert_eq!(parse_channels(&serde_json::json!({})).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn parse_channels_rejects_non_channel_arguments() {
        let params = serde_json::json!({ "arguments": [{ "type": "string", "value": "x" }] });
        assert!(parse_channels(&params).is_err());
    }
}
