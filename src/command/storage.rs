//! Storage domain processor: `getCookies`, `setCookie` via CDP
//! `Storage.getCookies` / `Storage.setCookies`. The `storagePartition`
//! requested by the client must name a `sourceOrigin`; `sameSite` is
//! mapped between the BiDi (`strict`/`lax`/`none`) and CDP
//! (`Strict`/`Lax`/`None`) spellings, defaulting unknown values to `Lax`
//! on read and rejecting them on write.

use bidicdp_cdp::storage::{Cookie, CookieParam, CookieSameSite, GetCookiesParams, SetCookiesParams};
use serde_json::Value;

use crate::error::BidiError;
use crate::session::BidiSession;

pub async fn dispatch(session: &BidiSession, action: &str, params: Value) -> Result<Value, BidiError> {
    match action {
        "getCookies" => get_cookies(session, params).await,
        "setCookie" => set_cookie(session, params).await,
        _ => Err(BidiError::unknown_command(format!("storage.{action}"))),
    }
}

fn require_source_origin(params: &Value) -> Result<(), BidiError> {
    let partition = params.get("partition");
    match partition.and_then(|p| p.get("sourceOrigin")).and_then(Value::as_str) {
        Some(_) => Ok(()),
        None => Err(BidiError::underspecified_storage_partition("storage commands require partition.sourceOrigin")),
    }
}

fn same_site_to_wire(same_site: Option<CookieSameSite>) -> &'static str {
    match same_site {
        Some(CookieSameSite::Strict) => "strict",
        Some(CookieSameSite::None) => "none",
        _ => "lax",
    }
}

fn same_site_from_wire(value: &str) -> Result<CookieSameSite, BidiError> {
    match value {
        "strict" => Ok(CookieSameSite::Strict),
        "lax" => Ok(CookieSameSite::Lax),
        "none" => Ok(CookieSameSite::None),
        other => Err(BidiError::invalid_argument(format!("unknown sameSite value: {other}"))),
    }
}

fn cookie_to_wire(cookie: &Cookie) -> Value {
    serde_json::json!({
        "name": cookie.name,
        "value": {"type": "string", "value": cookie.value},
        "domain": cookie.domain,
        "path": cookie.path,
        "size": cookie.size,
        "httpOnly": cookie.http_only,
        "secure": cookie.secure,
        "sameSite": same_site_to_wire(cookie.same_site),
        "expiry": if cookie.expires < 0.0 { None } else { Some(cookie.expires as i64) },
    })
}

async fn get_cookies(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    require_source_origin(&params)?;
    let resp = session.conn.execute(None, GetCookiesParams { browser_context_id: None }).await?;
    let cookies: Vec<Value> = resp.cookies.iter().map(cookie_to_wire).collect();
    Ok(serde_json::json!({ "cookies": cookies }))
}

async fn set_cookie(session: &BidiSession, params: Value) -> Result<Value, BidiError> {
    require_source_origin(&params)?;
    let cookie = params.get("cookie").ok_or_else(|| BidiError::invalid_argument("missing cookie"))?;
    let name = cookie.get("name").and_then(Value::as_str).ok_or_else(|| BidiError::invalid_argument("missing cookie.name"))?.to_string();
    let value = cookie
        .get("value")
        .and_then(|v| v.get("value"))
        .and_then(Value::as_str)
        .ok_or_else(|| BidiError::invalid_argument("missing cookie.value.value"))?
        .to_string();
    let domain = cookie.get("domain").and_then(Value::as_str).map(str::to_string);
    let path = cookie.get("path").and_then(Value::as_str).map(str::to_string);
    let secure = cookie.get("secure").and_then(Value::as_bool);
    let http_only = cookie.get("httpOnly").and_then(Value::as_bool);
    let expires = cookie.get("expiry").and_then(Value::as_f64);
    let same_site = match cookie.get("sameSite").and_then(Value::as_str) {
        Some(s) => Some(same_site_from_wire(s)?),
        None => None,
    };
    let source_origin = params
        .get("partition")
        .and_then(|p| p.get("sourceOrigin"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let result = session
        .conn
        .execute(
            None,
            SetCookiesParams {
                cookies: vec![CookieParam { name, value, url: source_origin, domain, path, secure, http_only, same_site, expires }],
                browser_context_id: None,
            },
        )
        .await;
    result.map_err(|err| BidiError::unable_to_set_cookie(err.to_string()))?;
    Ok(serde_json::json!({ "partition": { "type": "storageKey" } }))
}
