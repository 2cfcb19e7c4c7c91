//! Network domain processor: `addIntercept`, `continueRequest`,
//! `continueResponse`, `continueWithAuth`, `failRequest`, `provideResponse`,
//! `removeIntercept`. Resolves the request by id and invokes the
//! per-request interception API (network request state machine).

use bidicdp_cdp::fetch::{AuthChallengeResponse, AuthChallengeResponseResponse, HeaderEntry, RequestStage};
use bidicdp_cdp::network::RequestId;
use serde_json::Value;
use uuid::Uuid;

use crate::error::BidiError;
use crate::network::{error_reason_from_str, BodyOverride};
use crate::session::BidiSession;

pub async fn dispatch(session: &BidiSession, action: &str, params: Value) -> Result<Value, BidiError> {
    match action {
        "addIntercept" => add_intercept(session, params).await,
        "removeIntercept" => remove_intercept(session, params).await,
        "continueRequest" => continue_request(session, params).await,
        "continueResponse" => continue_response(session, params).await,
        "continueWithAuth" => continue_with_auth(session, params).await,
        "failRequest" => fail_request(session, params).await,
        "provideResponse" => provide_response(session, params).await,
        _ => Err(BidiError::unknown_command(format!("network.{action}"))),
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

fn phase_from_str(s: &str) -> Result<RequestStage, BidiError> {
    match s {
        "beforeRequestSent" => Ok(RequestStage::Request),
        "responseStarted" | "authRequired" => Ok(RequestStage::Response),
        other => Err(BidiError::invalid_argument(format!("unknown intercept phase: {other}"))),
    }
}

async fn add_intercept(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let phase_strs = string_list(&params, "phases")?;
    if phase_strs.is_empty() {
        return Err(BidiError::invalid_argument("phases must not be empty"));
    }
    let phases = phase_strs.iter().map(|s| phase_from_str(s)).collect::<Result<Vec<_>, _>>()?;
    let url_patterns = string_list(&params, "urlPatterns")?;
    let contexts = string_list(&params, "contexts")?;

    let id = session.network.lock().await.add_intercept(url_patterns, phases, contexts);
    Ok(serde_json::json!({ "intercept": id.to_string() }))
}

async fn remove_intercept(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let id_str = params
        .get("intercept")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing intercept"))?;
    let id = Uuid::parse_str(id_str).map_err(|_| BidiError::invalid_argument(format!("malformed intercept id: {id_str}")))?;
    if !session.network.lock().await.remove_intercept(&id) {
        return Err(BidiError::invalid_argument(format!("no such intercept: {id_str}")));
    }
    Ok(Value::Object(Default::default()))
}

fn headers_from_params(params: &Value, key: &str) -> Option<Vec<HeaderEntry>> {
    let arr = params.get(key)?.as_array()?;
    Some(
        arr.iter()
            .filter_map(|h| {
                let name = h.get("name")?.as_str()?.to_string();
                let value = h.get("value")?.get("value").and_then(Value::as_str)?.to_string();
                Some(HeaderEntry { name, value })
            })
            .collect(),
    )
}

fn body_override_from_params(params: &Value) -> Option<BodyOverride> {
    let body = params.get("body")?;
    let value = body.get("value")?.as_str()?.to_string();
    match body.get("type").and_then(Value::as_str) {
        Some("base64") => Some(BodyOverride::Base64(value)),
        _ => Some(BodyOverride::String(value)),
    }
}

async fn cdp_session_for(session: &BidiSession, request_id: &str) -> Result<String, BidiError> {
    session
        .network
        .lock()
        .await
        .session_for(&RequestId(request_id.to_string()))
        .map(|s| s.0)
        .ok_or_else(|| BidiError::no_such_frame(format!("no such request: {request_id}")))
}

async fn continue_request(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let request_id = params
        .get("request")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing request"))?;
    let cdp_session = cdp_session_for(session, request_id).await?;

    let overrides = crate::network::RequestOverrides {
        url: params.get("url").and_then(Value::as_str).map(str::to_string),
        method: params.get("method").and_then(Value::as_str).map(str::to_string),
        headers: headers_from_params(&params, "headers").map(|hs| hs.into_iter().map(|h| (h.name, h.value)).collect()),
        cookies: None,
        body: body_override_from_params(&params),
    };

    let mut net = session.network.lock().await;
    let req = net
        .get_mut(&RequestId(request_id.to_string()))
        .ok_or_else(|| BidiError::no_such_frame(format!("no such request: {request_id}")))?;
    req.continue_request(&session.conn, &cdp_session, overrides).await?;
    Ok(Value::Object(Default::default()))
}

async fn continue_response(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let request_id = params
        .get("request")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing request"))?;
    let cdp_session = cdp_session_for(session, request_id).await?;

    let status_code = params.get("statusCode").and_then(Value::as_i64);
    let reason_phrase = params.get("reasonPhrase").and_then(Value::as_str).map(str::to_string);
    let headers = headers_from_params(&params, "headers");

    let mut net = session.network.lock().await;
    let req = net
        .get_mut(&RequestId(request_id.to_string()))
        .ok_or_else(|| BidiError::no_such_frame(format!("no such request: {request_id}")))?;
    req.continue_response(&session.conn, &cdp_session, status_code, reason_phrase, headers).await?;
    Ok(Value::Object(Default::default()))
}

async fn continue_with_auth(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let request_id = params
        .get("request")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing request"))?;
    let cdp_session = cdp_session_for(session, request_id).await?;

    let action = params
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing action"))?;
    let response = match action {
        "default" => AuthChallengeResponse { response: Some(AuthChallengeResponseResponse::Default), username: None, password: None },
        "cancel" => AuthChallengeResponse { response: Some(AuthChallengeResponseResponse::CancelAuth), username: None, password: None },
        "provideCredentials" => {
            let creds = params
                .get("credentials")
                .ok_or_else(|| BidiError::invalid_argument("missing credentials"))?;
            let username = creds.get("username").and_then(Value::as_str).map(str::to_string);
            let password = creds.get("password").and_then(Value::as_str).map(str::to_string);
            AuthChallengeResponse { response: Some(AuthChallengeResponseResponse::ProvideCredentials), username, password }
        }
        other => return Err(BidiError::invalid_argument(format!("unknown auth action: {other}"))),
    };

    let mut net = session.network.lock().await;
    let req = net
        .get_mut(&RequestId(request_id.to_string()))
        .ok_or_else(|| BidiError::no_such_frame(format!("no such request: {request_id}")))?;
    req.continue_with_auth(&session.conn, &cdp_session, response).await?;
    Ok(Value::Object(Default::default()))
}

async fn fail_request(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let request_id = params
        .get("request")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing request"))?;
    let cdp_session = cdp_session_for(session, request_id).await?;
    let reason_str = params
        .get("errorReason")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing errorReason"))?;
    let error_reason = error_reason_from_str(reason_str).ok_or_else(|| BidiError::invalid_argument(format!("unknown error reason: {reason_str}")))?;

    let mut net = session.network.lock().await;
    let req = net
        .get_mut(&RequestId(request_id.to_string()))
        .ok_or_else(|| BidiError::no_such_frame(format!("no such request: {request_id}")))?;
    req.fail_request(&session.conn, &cdp_session, error_reason).await?;
    Ok(Value::Object(Default::default()))
}

async fn provide_response(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let request_id = params
        .get("request")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing request"))?;
    let cdp_session = cdp_session_for(session, request_id).await?;

    let status_code = params.get("statusCode").and_then(Value::as_i64);
    let reason_phrase = params.get("reasonPhrase").and_then(Value::as_str).map(str::to_string);
    let headers = headers_from_params(&params, "headers");
    let body = body_override_from_params(&params);
    let credentials = params.get("credentials").map(|creds| {
        (
            creds.get("username").and_then(Value::as_str).unwrap_or_default().to_string(),
            creds.get("password").and_then(Value::as_str).unwrap_or_default().to_string(),
        )
    });

    let mut net = session.network.lock().await;
    let req = net
        .get_mut(&RequestId(request_id.to_string()))
        .ok_or_else(|| BidiError::no_such_frame(format!("no such request: {request_id}")))?;
    req.provide_response(&session.conn, &cdp_session, status_code, reason_phrase, headers, body, credentials).await?;
    Ok(Value::Object(Default::default()))
}
