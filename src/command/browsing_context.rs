//! Browsing Context domain processor: `getTree`, `create`, `navigate`,
//! `reload`, `close` (top-level only), `activate`, `setViewport`,
//! `captureScreenshot`.

use bidicdp_cdp::{emulation, page, target};
use serde_json::Value;

use crate::browsing_context::BrowsingContext;
use crate::error::BidiError;
use crate::session::BidiSession;

pub async fn dispatch(session: &BidiSession, action: &str, params: Value) -> Result<Value, BidiError> {
    match action {
        "getTree" => get_tree(session, params).await,
        "create" => create(session, params).await,
        "navigate" => navigate(session, params).await,
        "reload" => reload(session, params).await,
        "close" => close(session, params).await,
        "activate" => activate(session, params).await,
        "setViewport" => set_viewport(session, params).await,
        "captureScreenshot" => capture_screenshot(session, params).await,
        _ => Err(BidiError::unknown_command(format!("browsingContext.{action}"))),
    }
}

fn context_info(ctx: &BrowsingContext, children: Option<Vec<Value>>) -> Value {
    serde_json::json!({
        "context": ctx.id,
        "url": ctx.url,
        "parent": ctx.parent,
        "children": children,
    })
}

fn build_node(store: &crate::browsing_context::BrowsingContextStore, id: &str, max_depth: Option<u64>, depth: u64) -> Value {
    let ctx = store.get(id).expect("id came from the store");
    let children = if max_depth.map(|d| depth < d).unwrap_or(true) {
        Some(ctx.children.iter().map(|c| build_node(store, c, max_depth, depth + 1)).collect())
    } else {
        None
    };
    context_info(ctx, children)
}

async fn get_tree(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let root = params.get("root").and_then(Value::as_str);
    let max_depth = params.get("maxDepth").and_then(Value::as_u64);
    let contexts = session.contexts.lock().await;

    let roots: Vec<String> = match root {
        Some(id) => {
            contexts.get(id).ok_or_else(|| BidiError::no_such_frame(format!("no such context: {id}")))?;
            vec![id.to_string()]
        }
        None => contexts.top_level_contexts().map(|c| c.id.clone()).collect(),
    };

    let tree: Vec<Value> = roots.iter().map(|id| build_node(&contexts, id, max_depth, 0)).collect();
    Ok(serde_json::json!({ "contexts": tree }))
}

async fn create(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let kind = params.get("type").and_then(Value::as_str).unwrap_or("tab");
    if kind != "tab" && kind != "window" {
        return Err(BidiError::invalid_argument(format!("unsupported context type: {kind}")));
    }

    let create_resp = session
        .conn
        .execute::<target::CreateTargetParams>(
            None,
            target::CreateTargetParams { url: "about:blank".to_string(), browser_context_id: None },
        )
        .await?;

    // The real context id is assigned once `Page.frameNavigated` reports the
    // new target's main frame id; the CDP target id stands in until then.
    let context_id = create_resp.target_id.0.clone();
    session.contexts.lock().await.create_top_level(context_id.clone(), Some(create_resp.target_id));

    Ok(serde_json::json!({ "context": context_id }))
}

async fn navigate(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let context_id = params
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing context"))?;
    let url = params
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing url"))?;

    let owning_target = {
        let contexts = session.contexts.lock().await;
        let ctx = contexts
            .get(context_id)
            .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {context_id}")))?;
        ctx.owning_target.clone()
    };
    let cdp_session = session.cdp_session_id_for_target(&owning_target).await?;

    let resp = session
        .conn
        .execute(Some(cdp_session.0.as_str()), page::NavigateParams { url: url.to_string(), frame_id: None })
        .await?;
    if let Some(err) = resp.error_text {
        return Err(BidiError::unknown(err));
    }
    Ok(serde_json::json!({ "navigation": null, "url": url }))
}

async fn reload(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let context_id = params
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing context"))?;
    let ignore_cache = params.get("ignoreCache").and_then(Value::as_bool);

    let owning_target = {
        let contexts = session.contexts.lock().await;
        let ctx = contexts
            .get(context_id)
            .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {context_id}")))?;
        ctx.owning_target.clone()
    };
    let cdp_session = session.cdp_session_id_for_target(&owning_target).await?;
    session
        .conn
        .execute(Some(cdp_session.0.as_str()), page::ReloadParams { ignore_cache })
        .await?;
    Ok(Value::Object(Default::default()))
}

async fn close(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let context_id = params
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing context"))?;

    let owning_target = {
        let contexts = session.contexts.lock().await;
        let ctx = contexts
            .get(context_id)
            .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {context_id}")))?;
        if !ctx.is_top_level() {
            return Err(BidiError::invalid_argument("browsingContext.close only accepts top-level contexts"));
        }
        ctx.owning_target.clone()
    };

    session
        .conn
        .execute(None, target::CloseTargetParams { target_id: owning_target })
        .await?;
    session.contexts.lock().await.destroy(context_id);
    Ok(Value::Object(Default::default()))
}

async fn activate(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let context_id = params
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing context"))?;
    let owning_target = {
        let contexts = session.contexts.lock().await;
        let ctx = contexts
            .get(context_id)
            .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {context_id}")))?;
        ctx.owning_target.clone()
    };
    session
        .conn
        .execute(None, target::ActivateTargetParams { target_id: owning_target })
        .await?;
    Ok(Value::Object(Default::default()))
}

async fn set_viewport(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let context_id = params
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing context"))?;
    let viewport = params
        .get("viewport")
        .ok_or_else(|| BidiError::invalid_argument("missing viewport"))?;
    let width = viewport.get("width").and_then(Value::as_u64).ok_or_else(|| BidiError::invalid_argument("missing width"))? as u32;
    let height = viewport.get("height").and_then(Value::as_u64).ok_or_else(|| BidiError::invalid_argument("missing height"))? as u32;
    let device_scale_factor = params.get("devicePixelRatio").and_then(Value::as_f64).unwrap_or(1.0);

    let owning_target = {
        let contexts = session.contexts.lock().await;
        let ctx = contexts
            .get(context_id)
            .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {context_id}")))?;
        ctx.owning_target.clone()
    };
    let cdp_session = session.cdp_session_id_for_target(&owning_target).await?;
    session
        .conn
        .execute(
            Some(cdp_session.0.as_str()),
            emulation::SetDeviceMetricsOverrideParams { width, height, device_scale_factor, mobile: false },
        )
        .await?;
    Ok(Value::Object(Default::default()))
}

async fn capture_screenshot(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    let context_id = params
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing context"))?;
    let owning_target = {
        let contexts = session.contexts.lock().await;
        let ctx = contexts
            .get(context_id)
            .ok_or_else(|| BidiError::no_such_frame(format!("no such context: {context_id}")))?;
        ctx.owning_target.clone()
    };
    let cdp_session = session.cdp_session_id_for_target(&owning_target).await?;
    let resp = session
        .conn
        .execute(Some(cdp_session.0.as_str()), page::CaptureScreenshotParams { format: None, quality: None })
        .await
        .map_err(|err| BidiError::unable_to_capture_screen(err.to_string()))?;
    Ok(serde_json::json!({ "data": resp.data }))
}
