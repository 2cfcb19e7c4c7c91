//! CDP event dispatch loop: the task that reads raw CDP events off a
//! [`Connection`], parses them, drives the domain stores, and emits the
//! resulting BiDi events through the Event Manager.

use std::sync::Arc;

use bidicdp_cdp::fetch::{self, RequestStage};
use bidicdp_cdp::network::{self, Headers, RequestId};
use bidicdp_cdp::{page, runtime, target, CdpEvent};
use bidicdp_types::SessionId;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use uuid::Uuid;

use crate::browsing_context::LifecycleState;
use crate::cdp_target::CdpTarget;
use crate::network::{NetworkEmission, NetworkRequest, PendingPauseRecord};
use crate::realm::{Realm, RealmType};
use crate::session::BidiSession;

fn auto_attach_params() -> target::SetAutoAttachParams {
    target::SetAutoAttachParams {
        auto_attach: true,
        wait_for_debugger_on_start: false,
        flatten: true,
    }
}

/// Spawns the dispatch loop against one browser connection. Runs until the
/// connection's event stream closes.
pub fn spawn(session: Arc<BidiSession>) -> tokio::task::JoinHandle<()> {
    let mut events = session.conn.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(raw) => {
                    let event = CdpEvent::parse(&raw.method, raw.params);
                    handle_event(&session, raw.session_id.as_deref(), event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "CDP event stream lagged; some events were dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn handle_event(session: &Arc<BidiSession>, cdp_session: Option<&str>, event: CdpEvent) {
    match event {
        CdpEvent::TargetAttachedToTarget(ev) => on_target_attached(session, ev).await,
        CdpEvent::TargetDetachedFromTarget(ev) => on_target_detached(session, ev).await,
        CdpEvent::TargetTargetCreated(_)
        | CdpEvent::TargetTargetDestroyed(_)
        | CdpEvent::TargetTargetCrashed(_)
        | CdpEvent::TargetTargetInfoChanged(_) => {
            // Discovery-level bookkeeping; the translator tracks targets
            // through attach/detach instead.
        }
        CdpEvent::PageFrameAttached(ev) => on_frame_attached(session, cdp_session, ev).await,
        CdpEvent::PageFrameDetached(ev) => on_frame_detached(session, ev).await,
        CdpEvent::PageFrameNavigated(ev) => on_frame_navigated(session, cdp_session, ev).await,
        CdpEvent::PageLifecycleEvent(ev) => on_lifecycle_event(session, ev).await,
        CdpEvent::PageJavascriptDialogOpening(_) => {
            // user-prompt handling is not wired up in this translator yet.
        }
        CdpEvent::RuntimeExecutionContextCreated(ev) => on_realm_created(session, cdp_session, ev).await,
        CdpEvent::RuntimeExecutionContextDestroyed(ev) => on_realm_destroyed(session, cdp_session, ev).await,
        CdpEvent::RuntimeExecutionContextsCleared => on_realms_cleared(session, cdp_session).await,
        CdpEvent::NetworkRequestWillBeSent(ev) => on_request_will_be_sent(session, cdp_session, ev).await,
        CdpEvent::NetworkRequestWillBeSentExtraInfo(ev) => on_request_extra_info(session, cdp_session, ev).await,
        CdpEvent::NetworkResponseReceived(ev) => on_response_received(session, cdp_session, ev).await,
        CdpEvent::NetworkResponseReceivedExtraInfo(ev) => on_response_extra_info(session, cdp_session, ev).await,
        CdpEvent::NetworkRequestServedFromCache(ev) => on_served_from_cache(session, cdp_session, ev).await,
        CdpEvent::NetworkLoadingFailed(ev) => on_loading_failed(session, cdp_session, ev).await,
        CdpEvent::NetworkLoadingFinished(_) => {
            // No BiDi event is tied to this signal; `responseCompleted`
            // already fires off `Network.responseReceived` plus its extra
            // info.
        }
        CdpEvent::FetchRequestPaused(ev) => on_request_paused(session, cdp_session, ev).await,
        CdpEvent::FetchAuthRequired(ev) => on_auth_required(session, ev).await,
        CdpEvent::Other { .. } => {
            // Already relayed verbatim by the owning `CdpTarget`'s wildcard
            // relay, which subscribes to the same broadcast stream.
        }
    }
}

fn context_event_payload(id: &str, parent: Option<&str>, url: &str) -> Value {
    json!({ "context": id, "url": url, "parent": parent, "children": Value::Null })
}

async fn resolve_context(session: &BidiSession, frame_id: Option<&str>) -> Option<String> {
    let frame_id = frame_id?;
    session.contexts.lock().await.find_by_frame_id(frame_id).map(|c| c.id.clone())
}

// --- Target attach/detach --------------------------------------------------

async fn on_target_attached(session: &BidiSession, ev: target::EventAttachedToTarget) {
    let cdp_session = ev.session_id.clone();
    let network_domain_enabled = session.events.network_domain_enabled();
    let user_context = ev
        .target_info
        .browser_context_id
        .clone()
        .map(|b| b.0)
        .unwrap_or_else(|| "default".to_string());

    let cdp_target = {
        let mut preload = session.preload.lock().await;
        match CdpTarget::create(
            ev.target_info.target_id.clone(),
            None,
            cdp_session.clone(),
            &session.conn,
            network_domain_enabled,
            &mut preload,
            &user_context,
            &ev.target_info.target_type,
            auto_attach_params(),
        )
        .await
        {
            Ok(target) => target,
            Err(err) if err.is_close_error() => return,
            Err(err) => {
                warn!(%err, target = %ev.target_info.target_id.0, "failed to initialize CDP target");
                return;
            }
        }
    };

    if ev.target_info.target_type == "page" {
        let already_known = {
            let mut contexts = session.contexts.lock().await;
            let known = contexts.get(&ev.target_info.target_id.0).is_some();
            if !known {
                contexts.create_top_level(ev.target_info.target_id.0.clone(), Some(ev.target_info.target_id.clone()));
            }
            known
        };
        if !already_known {
            session
                .events
                .emit(
                    "browsingContext.contextCreated",
                    context_event_payload(&ev.target_info.target_id.0, None, &ev.target_info.url),
                    Some(ev.target_info.target_id.0.clone()),
                    "context-created",
                )
                .await;
        }
    }

    let events = session.events.clone();
    let relay_session = cdp_session.clone();
    cdp_target.spawn_wildcard_relay(&session.conn, move |raw| {
        let events = events.clone();
        let payload = json!({ "event": raw.method, "params": raw.params, "session": relay_session.0 });
        tokio::spawn(async move {
            events.emit("cdp.eventReceived", payload, None, "cdp-relay").await;
        });
    });

    session.targets.lock().await.insert(cdp_session, cdp_target);
}

async fn on_target_detached(session: &BidiSession, ev: target::EventDetachedFromTarget) {
    session.targets.lock().await.remove(&ev.session_id);
    session.network.lock().await.clear_session(&ev.session_id);

    let removed_realms = session.realms.lock().await.remove_session(&ev.session_id);
    for realm in removed_realms {
        session
            .events
            .emit("script.realmDestroyed", json!({ "realm": realm.id.to_string() }), None, "realm-destroyed")
            .await;
    }

    let Some(target_id) = ev.target_id else { return };
    let removed = {
        let mut contexts = session.contexts.lock().await;
        if contexts.get(&target_id.0).is_none() {
            return;
        }
        let top_level = contexts.find_top_level_context_id(&target_id.0);
        contexts.destroy(&target_id.0).into_iter().map(|c| (c, top_level.clone())).collect::<Vec<_>>()
    };
    for (ctx, top_level) in removed {
        session
            .events
            .emit(
                "browsingContext.contextDestroyed",
                context_event_payload(&ctx.id, ctx.parent.as_deref(), &ctx.url),
                top_level,
                "context-destroyed",
            )
            .await;
    }
}

// --- Frame tree -------------------------------------------------------------

async fn owning_target_id(session: &BidiSession, cdp_session: &str) -> Option<target::TargetId> {
    session
        .targets
        .lock()
        .await
        .get(&SessionId(cdp_session.to_string()))
        .map(|t| t.target_id.clone())
}

async fn on_frame_attached(session: &BidiSession, cdp_session: Option<&str>, ev: page::EventFrameAttached) {
    let Some(cdp_session) = cdp_session else { return };
    let Some(owning_target) = owning_target_id(session, cdp_session).await else { return };

    let mut contexts = session.contexts.lock().await;
    if contexts.get(&ev.frame_id.0).is_some() {
        return;
    }
    let parent_context = contexts
        .find_by_frame_id(&ev.parent_frame_id.0)
        .map(|c| c.id.clone())
        .unwrap_or_else(|| ev.parent_frame_id.0.clone());
    contexts.create_child(ev.frame_id.0.clone(), parent_context.clone(), owning_target);
    let top_level = contexts.find_top_level_context_id(&ev.frame_id.0);
    drop(contexts);

    session
        .events
        .emit(
            "browsingContext.contextCreated",
            context_event_payload(&ev.frame_id.0, Some(&parent_context), "about:blank"),
            top_level,
            "context-created",
        )
        .await;
}

async fn on_frame_detached(session: &BidiSession, ev: page::EventFrameDetached) {
    let removed = {
        let mut contexts = session.contexts.lock().await;
        if contexts.get(&ev.frame_id.0).is_none() {
            return;
        }
        let top_level = contexts.find_top_level_context_id(&ev.frame_id.0);
        contexts.destroy(&ev.frame_id.0).into_iter().map(|c| (c, top_level.clone())).collect::<Vec<_>>()
    };
    for (ctx, top_level) in removed {
        session
            .events
            .emit(
                "browsingContext.contextDestroyed",
                context_event_payload(&ctx.id, ctx.parent.as_deref(), &ctx.url),
                top_level,
                "context-destroyed",
            )
            .await;
    }
}

async fn on_frame_navigated(session: &BidiSession, cdp_session: Option<&str>, ev: page::EventFrameNavigated) {
    let frame = ev.frame;
    if frame.parent_id.is_none() {
        let Some(cdp_session) = cdp_session else { return };
        let Some(owning_target) = owning_target_id(session, cdp_session).await else { return };
        let mut contexts = session.contexts.lock().await;
        if let Some(ctx) = contexts.get_mut(&owning_target.0) {
            ctx.url = frame.url;
        }
        contexts.set_main_frame_id(&owning_target.0, frame.id.0);
    } else {
        let mut contexts = session.contexts.lock().await;
        if let Some(ctx) = contexts.get_mut(&frame.id.0) {
            ctx.url = frame.url;
        }
    }
}

async fn on_lifecycle_event(session: &BidiSession, ev: page::EventLifecycleEvent) {
    let event_name = match ev.name.as_str() {
        "DOMContentLoaded" => "browsingContext.domContentLoaded",
        "load" => "browsingContext.load",
        _ => return,
    };
    let new_state = if ev.name == "DOMContentLoaded" { LifecycleState::DomContentLoaded } else { LifecycleState::Load };

    let mut contexts = session.contexts.lock().await;
    let Some(context_id) = contexts.find_by_frame_id(&ev.frame_id.0).map(|c| c.id.clone()) else { return };
    let top_level = contexts.find_top_level_context_id(&context_id);
    let Some(ctx) = contexts.get_mut(&context_id) else { return };
    ctx.lifecycle = new_state;
    let url = ctx.url.clone();
    drop(contexts);

    session.events.emit(event_name, json!({ "context": context_id, "url": url }), top_level, "lifecycle").await;
}

// --- Realms ------------------------------------------------------------------

fn realm_wire_type(realm_type: &RealmType) -> &'static str {
    match realm_type {
        RealmType::Window => "window",
        RealmType::DedicatedWorker { .. } => "dedicated-worker",
        RealmType::SharedWorker => "shared-worker",
        RealmType::ServiceWorker => "service-worker",
        RealmType::Sandbox { .. } => "sandbox",
    }
}

async fn on_realm_created(session: &Arc<BidiSession>, cdp_session: Option<&str>, ev: runtime::EventExecutionContextCreated) {
    let Some(cdp_session) = cdp_session else { return };
    let cdp_session = SessionId(cdp_session.to_string());
    let description = ev.context;

    let (target_type, user_context) = {
        let targets = session.targets.lock().await;
        let target = targets.get(&cdp_session);
        (target.map(|t| t.target_type.clone()), target.map(|t| t.user_context.clone()).unwrap_or_default())
    };
    let browsing_context_id = match &description.aux_data.frame_id {
        Some(frame_id) => session.contexts.lock().await.find_by_frame_id(&frame_id.0).map(|c| c.id.clone()),
        None => None,
    };

    let realm_type = match target_type.as_deref() {
        Some("worker") => RealmType::DedicatedWorker { owner: browsing_context_id.clone().unwrap_or_default() },
        Some("service_worker") => RealmType::ServiceWorker,
        Some("shared_worker") => RealmType::SharedWorker,
        _ if !description.aux_data.is_default && description.aux_data.world_type.as_deref() == Some("isolated") => {
            RealmType::Sandbox { name: description.name.clone() }
        }
        _ => RealmType::Window,
    };

    let realm = Realm {
        id: Uuid::new_v4(),
        realm_type,
        cdp_session,
        execution_context_id: description.id,
        origin: description.origin.clone(),
        associated_browsing_contexts: browsing_context_id.into_iter().collect(),
    };

    let id = realm.id;
    let origin = realm.origin.clone();
    let wire_type = realm_wire_type(&realm.realm_type);
    let context = realm.associated_browsing_contexts.first().cloned();
    start_channel_pollers(session, &realm, &user_context).await;
    session.realms.lock().await.insert(realm);

    session
        .events
        .emit(
            "script.realmCreated",
            json!({ "realm": id.to_string(), "origin": origin, "type": wire_type, "context": context }),
            None,
            "realm-created",
        )
        .await;
}

async fn on_realm_destroyed(session: &BidiSession, cdp_session: Option<&str>, ev: runtime::EventExecutionContextDestroyed) {
    let Some(cdp_session) = cdp_session else { return };
    let cdp_session = SessionId(cdp_session.to_string());
    let removed = session.realms.lock().await.remove_by_cdp_context(&cdp_session, ev.execution_context_id);
    if let Some(realm) = removed {
        stop_channel_pollers(session, realm.id).await;
        session
            .events
            .emit("script.realmDestroyed", json!({ "realm": realm.id.to_string() }), None, "realm-destroyed")
            .await;
    }
}

async fn on_realms_cleared(session: &BidiSession, cdp_session: Option<&str>) {
    let Some(cdp_session) = cdp_session else { return };
    let cdp_session = SessionId(cdp_session.to_string());
    let removed = session.realms.lock().await.remove_session(&cdp_session);
    for realm in removed {
        stop_channel_pollers(session, realm.id).await;
        session
            .events
            .emit("script.realmDestroyed", json!({ "realm": realm.id.to_string() }), None, "realm-destroyed")
            .await;
    }
}

/// Starts one poll task per `(in-scope preload script, declared channel)`
/// pair for a freshly created window realm. Each task blocks on
/// `Runtime.callFunctionOn(awaitPromise=true)` against the channel's queue
/// object and turns every resolved value into a `script.message` event.
async fn start_channel_pollers(session: &Arc<BidiSession>, realm: &Realm, user_context: &str) {
    if realm.realm_type != RealmType::Window {
        return;
    }
    let wired = session.preload.lock().await.scripts_with_channels_in_scope(user_context);
    if wired.is_empty() {
        return;
    }
    let context = realm.associated_browsing_contexts.first().cloned();
    let mut handles = Vec::new();
    for (script_id, channels) in wired {
        for channel in channels {
            let session = session.clone();
            let cdp_session = realm.cdp_session.clone();
            let execution_context_id = realm.execution_context_id;
            let realm_id = realm.id;
            let context = context.clone();
            handles.push(tokio::spawn(async move {
                poll_channel(&session, cdp_session, execution_context_id, realm_id, &context, script_id, channel).await;
            }));
        }
    }
    session.script_pollers.lock().await.insert(realm.id, handles);
}

async fn poll_channel(
    session: &BidiSession,
    cdp_session: SessionId,
    execution_context_id: runtime::ExecutionContextId,
    realm_id: Uuid,
    context: &Option<String>,
    script_id: Uuid,
    channel: String,
) {
    let accessor = crate::preload::queue_accessor(script_id, &channel);
    let queue = session
        .conn
        .execute(
            Some(cdp_session.0.as_str()),
            runtime::EvaluateParams {
                expression: accessor,
                context_id: Some(execution_context_id),
                await_promise: Some(false),
                return_by_value: Some(false),
            },
        )
        .await;
    let object_id = match queue {
        Ok(resp) => match resp.result.object_id {
            Some(id) => id,
            None => return,
        },
        Err(_) => return,
    };

    loop {
        let resp = session
            .conn
            .execute(
                Some(cdp_session.0.as_str()),
                runtime::CallFunctionOnParams {
                    function_declaration: "function() { return this.getMessage(); }".to_string(),
                    execution_context_id: None,
                    object_id: Some(object_id.clone()),
                    arguments: None,
                    await_promise: Some(true),
                    return_by_value: Some(true),
                },
            )
            .await;
        let resp = match resp {
            Ok(resp) => resp,
            Err(_) => return,
        };
        if resp.exception_details.is_some() {
            return;
        }
        session
            .events
            .emit(
                "script.message",
                json!({
                    "channel": { "type": "channel", "id": channel },
                    "data": crate::command::script::remote_object_to_value(&resp.result),
                    "source": { "realm": realm_id.to_string(), "context": context },
                }),
                context.clone(),
                "script-message",
            )
            .await;
    }
}

async fn stop_channel_pollers(session: &BidiSession, realm_id: Uuid) {
    if let Some(handles) = session.script_pollers.lock().await.remove(&realm_id) {
        for handle in handles {
            handle.abort();
        }
    }
}

// --- Network -----------------------------------------------------------------

fn headers_json(headers: &Headers) -> Value {
    Value::Array(
        headers
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": { "type": "string", "value": value } }))
            .collect(),
    )
}

fn headers_size(headers: &Headers) -> usize {
    headers.iter().map(|(k, v)| format!("{k}: {v}\r\n").len()).sum()
}

fn base_request_json(req: &NetworkRequest) -> Value {
    let info = req.info.clone().unwrap_or_default();
    let headers = req.extra_info.clone().unwrap_or_else(|| info.headers.clone());
    let body_size = info.post_data.as_ref().map(|b| b.len()).unwrap_or(0);
    json!({
        "request": req.id.0,
        "url": info.url,
        "method": info.method,
        "headers": headers_json(&headers),
        "cookies": Value::Array(Vec::new()),
        "headersSize": headers_size(&headers),
        "bodySize": body_size,
        "timings": Value::Object(Default::default()),
    })
}

fn network_base_payload(req: &NetworkRequest, context: Option<&str>) -> Value {
    json!({
        "context": context,
        "isBlocked": req.intercept_phase.is_some(),
        "navigation": Value::Null,
        "redirectCount": req.redirect_count,
        "request": base_request_json(req),
    })
}

fn response_json(req: &NetworkRequest) -> Value {
    let resp = req.response_info.clone().unwrap_or_default();
    let headers = req.response_extra_info.clone().unwrap_or_else(|| resp.headers.clone());
    json!({
        "url": resp.url,
        "protocol": "",
        "status": resp.status,
        "statusText": resp.status_text,
        "fromCache": req.served_from_cache || resp.from_disk_cache,
        "headers": headers_json(&headers),
        "mimeType": resp.mime_type,
        "bytesReceived": resp.encoded_data_length,
        "headersSize": headers_size(&headers),
        "content": { "size": resp.encoded_data_length },
        "authChallenges": Value::Null,
    })
}

fn network_emission_payload(req: &NetworkRequest, kind: NetworkEmission, context: Option<&str>) -> (String, Value) {
    match kind {
        NetworkEmission::BeforeRequestSent => ("network.beforeRequestSent".to_string(), network_base_payload(req, context)),
        NetworkEmission::ResponseStarted => {
            let mut payload = network_base_payload(req, context);
            payload["response"] = response_json(req);
            ("network.responseStarted".to_string(), payload)
        }
        NetworkEmission::ResponseCompleted => {
            let mut payload = network_base_payload(req, context);
            payload["response"] = response_json(req);
            ("network.responseCompleted".to_string(), payload)
        }
        NetworkEmission::FetchError => {
            let mut payload = network_base_payload(req, context);
            payload["errorText"] = json!(req.loading_failed.clone().unwrap_or_default());
            ("network.fetchError".to_string(), payload)
        }
        NetworkEmission::AuthRequired => {
            let mut payload = network_base_payload(req, context);
            payload["response"] = response_json(req);
            ("network.authRequired".to_string(), payload)
        }
    }
}

/// Re-runs gating, collects every emission now ready, and dispatches them —
/// shared by every network handler after it applies its own CDP event.
/// Favicon requests are tracked (for interception bookkeeping) but never
/// surfaced over the wire.
async fn evaluate_and_emit(session: &BidiSession, id: &RequestId) {
    let mut net = session.network.lock().await;
    let Some(req) = net.get(id) else { return };
    let context = req.browsing_context_id.clone();
    let url = req.info.as_ref().map(|i| i.url.clone()).unwrap_or_default();
    let before_request_intercept = net.has_active_intercept_for_phase(&url, context.as_deref(), RequestStage::Request);
    let response_intercept = net.has_active_intercept_for_phase(&url, context.as_deref(), RequestStage::Response);

    let req = net.get_mut(id).expect("checked above");
    let ready = req.evaluate(before_request_intercept, response_intercept);
    let emissions = if req.is_favicon() {
        Vec::new()
    } else {
        ready.into_iter().map(|kind| network_emission_payload(req, kind, context.as_deref())).collect::<Vec<_>>()
    };
    drop(net);

    for (method, payload) in emissions {
        session.events.emit(method, payload, None, "network").await;
    }
}

async fn on_request_will_be_sent(session: &BidiSession, cdp_session: Option<&str>, ev: network::EventRequestWillBeSent) {
    let Some(cdp_session) = cdp_session else { return };
    let cdp_session = SessionId(cdp_session.to_string());
    let frame_id = ev.frame_id.as_ref().map(|f| f.0.clone());
    let browsing_context_id = resolve_context(session, frame_id.as_deref()).await;

    let redirect_payload = {
        let mut net = session.network.lock().await;
        let mut redirect_payload = None;
        if let Some(redirect_response) = ev.redirect_response {
            if let Some(prev) = net.get_mut(&ev.request_id) {
                prev.flush_as_redirect(redirect_response);
                if !prev.is_favicon() {
                    redirect_payload = Some(network_emission_payload(prev, NetworkEmission::ResponseCompleted, browsing_context_id.as_deref()));
                }
                let fresh = prev.next_redirect();
                net.replace_with_redirect(&ev.request_id, cdp_session.clone(), fresh);
            }
        }

        let pending = net.take_pending_pause(&ev.request_id);
        let req = net.get_or_create(ev.request_id.clone(), cdp_session);
        req.browsing_context_id = browsing_context_id;
        req.apply_request_will_be_sent(ev.request, ev.frame_id);
        if let Some(pending) = pending {
            if let Some(fetch_id) = pending.fetch_id {
                req.apply_request_paused(fetch::FetchRequestId(fetch_id), pending.is_response_phase);
            }
        }
        redirect_payload
    };

    if let Some((method, payload)) = redirect_payload {
        session.events.emit(method, payload, None, "network").await;
    }
    evaluate_and_emit(session, &ev.request_id).await;
}

async fn on_request_extra_info(session: &BidiSession, cdp_session: Option<&str>, ev: network::EventRequestWillBeSentExtraInfo) {
    let cdp_session = SessionId(cdp_session.unwrap_or_default().to_string());
    {
        let mut net = session.network.lock().await;
        net.get_or_create(ev.request_id.clone(), cdp_session).apply_extra_info(ev.headers);
    }
    evaluate_and_emit(session, &ev.request_id).await;
}

async fn on_response_received(session: &BidiSession, cdp_session: Option<&str>, ev: network::EventResponseReceived) {
    let cdp_session = SessionId(cdp_session.unwrap_or_default().to_string());
    {
        let mut net = session.network.lock().await;
        net.get_or_create(ev.request_id.clone(), cdp_session)
            .apply_response_received(ev.response, ev.has_extra_info);
    }
    evaluate_and_emit(session, &ev.request_id).await;
}

async fn on_response_extra_info(session: &BidiSession, cdp_session: Option<&str>, ev: network::EventResponseReceivedExtraInfo) {
    let cdp_session = SessionId(cdp_session.unwrap_or_default().to_string());
    {
        let mut net = session.network.lock().await;
        net.get_or_create(ev.request_id.clone(), cdp_session).apply_response_extra_info(ev.headers);
    }
    evaluate_and_emit(session, &ev.request_id).await;
}

async fn on_served_from_cache(session: &BidiSession, cdp_session: Option<&str>, ev: network::EventRequestServedFromCache) {
    let cdp_session = SessionId(cdp_session.unwrap_or_default().to_string());
    {
        let mut net = session.network.lock().await;
        net.get_or_create(ev.request_id.clone(), cdp_session).apply_served_from_cache();
    }
    evaluate_and_emit(session, &ev.request_id).await;
}

async fn on_loading_failed(session: &BidiSession, cdp_session: Option<&str>, ev: network::EventLoadingFailed) {
    let cdp_session = SessionId(cdp_session.unwrap_or_default().to_string());
    {
        let mut net = session.network.lock().await;
        net.get_or_create(ev.request_id.clone(), cdp_session).apply_loading_failed(ev.error_text);
    }
    evaluate_and_emit(session, &ev.request_id).await;
}

async fn on_request_paused(session: &BidiSession, cdp_session: Option<&str>, ev: fetch::EventRequestPaused) {
    let is_response_phase = ev.is_response_phase();
    // `Fetch.requestPaused.networkId` correlates to the Network domain's
    // request id when that domain is enabled; fall back to the fetch id
    // itself (there's nothing else to key the request on) when it isn't.
    let request_id = ev.network_id.unwrap_or_else(|| RequestId(ev.request_id.0.clone()));
    let cdp_session = SessionId(cdp_session.unwrap_or_default().to_string());

    let mut net = session.network.lock().await;
    if net.get(&request_id).is_none() {
        net.record_pending_pause(
            request_id,
            PendingPauseRecord { fetch_id: Some(ev.request_id.0), is_response_phase, session: cdp_session },
        );
        return;
    }
    net.get_mut(&request_id).expect("checked above").apply_request_paused(ev.request_id, is_response_phase);
    drop(net);
    evaluate_and_emit(session, &request_id).await;
}

async fn on_auth_required(session: &BidiSession, ev: fetch::EventAuthRequired) {
    // `Fetch.authRequired` carries no separate network id; its own fetch id
    // is the closest available correlation key.
    let request_id = RequestId(ev.request_id.0.clone());
    {
        let mut net = session.network.lock().await;
        net.get_or_create(request_id.clone(), SessionId(String::new()))
            .apply_auth_required(ev.request_id, ev.auth_challenge);
    }
    evaluate_and_emit(session, &request_id).await;
}
