//! Network Request state machine — assembles BiDi network events out of
//! CDP event streams that arrive in an undefined relative order.

use bidicdp_cdp::fetch::{self, AuthChallenge, AuthChallengeResponse, AuthChallengeResponseResponse, ErrorReason, FetchRequestId, HeaderEntry};
use bidicdp_cdp::network::{Headers, RequestData, RequestId, ResponseData};
use bidicdp_cdp::page::FrameId;
use tokio::sync::watch;

use crate::conn::Connection;
use crate::error::BidiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptPhase {
    BeforeRequestSent,
    ResponseStarted,
    AuthRequired,
}

#[derive(Debug, Clone)]
pub enum BodyOverride {
    String(String),
    Base64(String),
}

impl BodyOverride {
    /// The value CDP expects — always base64.
    pub fn to_cdp_base64(&self) -> String {
        use base64::engine::{general_purpose::STANDARD, Engine as _};
        match self {
            BodyOverride::String(s) => STANDARD.encode(s.as_bytes()),
            BodyOverride::Base64(b) => b.clone(),
        }
    }

    /// Length used for the reported `bodySize` — original string length, or
    /// decoded byte length for base64 payloads.
    pub fn body_size(&self) -> usize {
        use base64::engine::{general_purpose::STANDARD, Engine as _};
        match self {
            BodyOverride::String(s) => s.len(),
            BodyOverride::Base64(b) => STANDARD.decode(b).map(|v| v.len()).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<Vec<(String, String)>>,
    pub cookies: Option<Vec<(String, String)>>,
    pub body: Option<BodyOverride>,
}

impl RequestOverrides {
    /// Merges cookie and header overrides into the CDP header list.
    pub fn merged_headers(&self, base: &Headers) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = if let Some(headers) = &self.headers {
            headers.clone()
        } else {
            base.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        if let Some(cookies) = &self.cookies {
            out.retain(|(k, _)| !k.eq_ignore_ascii_case("cookie"));
            let cookie_value = cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            if !cookie_value.is_empty() {
                out.push(("cookie".to_string(), cookie_value));
            }
        }
        out
    }
}

#[derive(Debug, Default)]
struct EmittedFlags {
    before_request_sent: bool,
    response_started: bool,
    response_completed: bool,
    fetch_error: bool,
}

/// One in-flight (or just-completed) network exchange.
pub struct NetworkRequest {
    pub id: RequestId,
    pub browsing_context_id: Option<String>,
    pub frame_id: Option<FrameId>,
    pub redirect_count: u32,

    pub info: Option<RequestData>,
    pub extra_info: Option<Headers>,
    pub response_info: Option<ResponseData>,
    pub response_has_extra_info: bool,
    pub response_extra_info: Option<Headers>,
    pub served_from_cache: bool,
    pub loading_failed: Option<String>,

    pub fetch_id: Option<FetchRequestId>,
    pub request_paused: bool,
    pub response_paused: bool,
    pub auth_challenge: Option<AuthChallenge>,
    pub intercept_phase: Option<InterceptPhase>,
    pub overrides: RequestOverrides,

    emitted: EmittedFlags,
    phase_tx: watch::Sender<u64>,
    generation: u64,
}

/// What an applied CDP event made ready to emit. Carried back to the caller
/// (Network Storage) so it can hand it to the Event Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEmission {
    BeforeRequestSent,
    ResponseStarted,
    ResponseCompleted,
    FetchError,
    AuthRequired,
}

impl NetworkRequest {
    pub fn new(id: RequestId) -> Self {
        let (phase_tx, _rx) = watch::channel(0);
        Self {
            id,
            browsing_context_id: None,
            frame_id: None,
            redirect_count: 0,
            info: None,
            extra_info: None,
            response_info: None,
            response_has_extra_info: false,
            response_extra_info: None,
            served_from_cache: false,
            loading_failed: None,
            fetch_id: None,
            request_paused: false,
            response_paused: false,
            auth_challenge: None,
            intercept_phase: None,
            overrides: RequestOverrides::default(),
            emitted: EmittedFlags::default(),
            phase_tx,
            generation: 0,
        }
    }

    /// A fresh request carrying the next redirect id — same request id,
    /// incremented `redirectCount`.
    pub fn next_redirect(&self) -> Self {
        let mut fresh = Self::new(self.id.clone());
        fresh.redirect_count = self.redirect_count + 1;
        fresh.browsing_context_id = self.browsing_context_id.clone();
        fresh
    }

    pub fn is_favicon(&self) -> bool {
        self.info.as_ref().map(|i| i.url.ends_with("/favicon.ico")).unwrap_or(false)
    }

    fn is_data_url(&self) -> bool {
        self.info.as_ref().map(|i| i.url.starts_with("data:")).unwrap_or(false)
    }

    /// `requestInterceptionExpected`.
    pub fn interception_expected(&self, has_active_before_request_sent_intercept: bool) -> bool {
        !self.is_data_url() && !self.served_from_cache && has_active_before_request_sent_intercept
    }

    /// `requestExtraInfoCompleted`.
    pub fn extra_info_completed(&self, flushed_or_failed: bool) -> bool {
        flushed_or_failed
            || self.is_data_url()
            || self.extra_info.is_some()
            || self.served_from_cache
            || (self.response_info.is_some() && !self.response_has_extra_info)
    }

    /// `requestInterceptionCompleted`.
    pub fn interception_completed(&self, interception_expected: bool) -> bool {
        !interception_expected || self.request_paused
    }

    fn bump_phase(&mut self) {
        self.generation += 1;
        let _ = self.phase_tx.send(self.generation);
    }

    /// Waits for the next successful emission after this call — the signal
    /// is immediately replaced on each firing.
    pub async fn wait_next_phase(&self) {
        let mut rx = self.phase_tx.subscribe();
        let seen = *rx.borrow();
        while *rx.borrow() <= seen {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn apply_request_will_be_sent(&mut self, data: RequestData, frame_id: Option<FrameId>) {
        self.frame_id = frame_id;
        self.info = Some(data);
    }

    pub fn apply_extra_info(&mut self, headers: Headers) {
        self.extra_info = Some(headers);
    }

    pub fn apply_response_received(&mut self, response: ResponseData, has_extra_info: bool) {
        self.response_info = Some(response);
        self.response_has_extra_info = has_extra_info;
    }

    /// Drops a 30x extra-info payload whose `location` matches the request
    /// URL — it belongs to the redirect, not this response.
    pub fn apply_response_extra_info(&mut self, headers: Headers) {
        if let Some(response) = &self.response_info {
            if (300..400).contains(&response.status) {
                if let Some(location) = headers.get("location").or_else(|| headers.get("Location")) {
                    if let Some(info) = &self.info {
                        if location == &info.url {
                            return;
                        }
                    }
                }
            }
        }
        self.response_extra_info = Some(headers);
    }

    pub fn apply_served_from_cache(&mut self) {
        self.served_from_cache = true;
    }

    pub fn apply_loading_failed(&mut self, error_text: String) {
        self.loading_failed = Some(error_text);
    }

    pub fn apply_request_paused(&mut self, fetch_id: FetchRequestId, is_response_phase: bool) {
        self.fetch_id = Some(fetch_id);
        if is_response_phase {
            self.response_paused = true;
            self.intercept_phase = Some(InterceptPhase::ResponseStarted);
        } else {
            self.request_paused = true;
            self.intercept_phase = Some(InterceptPhase::BeforeRequestSent);
        }
    }

    pub fn apply_auth_required(&mut self, fetch_id: FetchRequestId, challenge: AuthChallenge) {
        self.fetch_id = Some(fetch_id);
        self.auth_challenge = Some(challenge);
        self.intercept_phase = Some(InterceptPhase::AuthRequired);
    }

    /// Re-evaluates gating predicates and returns every emission newly
    /// ready to fire. `has_active_before_request_sent_intercept` and
    /// `response_phase_interception_expected` come from Network Storage's
    /// intercept matching.
    pub fn evaluate(
        &mut self,
        has_active_before_request_sent_intercept: bool,
        response_phase_interception_expected: bool,
    ) -> Vec<NetworkEmission> {
        let mut ready = Vec::new();
        let flushed_or_failed = self.loading_failed.is_some();
        let interception_expected = self.interception_expected(has_active_before_request_sent_intercept);
        let interception_completed = self.interception_completed(interception_expected);
        let extra_info_completed = self.extra_info_completed(flushed_or_failed);

        if !self.emitted.before_request_sent
            && self.info.is_some()
            && (if interception_expected { interception_completed } else { extra_info_completed })
        {
            self.emitted.before_request_sent = true;
            self.bump_phase();
            ready.push(NetworkEmission::BeforeRequestSent);
        }

        if !self.emitted.response_started
            && (self.response_info.is_some() || (response_phase_interception_expected && self.response_paused))
        {
            self.emitted.response_started = true;
            self.bump_phase();
            ready.push(NetworkEmission::ResponseStarted);
        }

        let response_extra_info_completed = flushed_or_failed
            || self.served_from_cache
            || !self.response_has_extra_info
            || self.response_extra_info.is_some();
        let response_interception_completed = !response_phase_interception_expected || self.response_paused;

        if !self.emitted.response_completed
            && self.response_info.is_some()
            && response_extra_info_completed
            && response_interception_completed
        {
            self.emitted.response_completed = true;
            self.bump_phase();
            ready.push(NetworkEmission::ResponseCompleted);
        }

        if !self.emitted.fetch_error && self.loading_failed.is_some() {
            self.emitted.fetch_error = true;
            self.bump_phase();
            ready.push(NetworkEmission::FetchError);
        }

        // auth-required may fire more than once per request.
        if self.auth_challenge.is_some() && matches!(self.intercept_phase, Some(InterceptPhase::AuthRequired)) {
            self.bump_phase();
            ready.push(NetworkEmission::AuthRequired);
            self.auth_challenge = None;
        }

        ready
    }

    /// Synthesizes a `responseCompleted` flush before a redirect is
    /// consumed.
    pub fn flush_as_redirect(&mut self, redirect_response: ResponseData) {
        self.response_info = Some(redirect_response);
        self.response_has_extra_info = false;
        self.emitted.response_completed = true;
        self.bump_phase();
    }

    fn require_fetch_id(&self) -> Result<FetchRequestId, BidiError> {
        self.fetch_id.clone().ok_or_else(|| BidiError::unknown("Network Interception not set-up"))
    }

    fn header_entries(&self, overrides: &RequestOverrides) -> Option<Vec<HeaderEntry>> {
        let base = self.info.as_ref().map(|i| i.headers.clone()).unwrap_or_default();
        let merged = overrides.merged_headers(&base);
        if merged.is_empty() {
            None
        } else {
            Some(merged.into_iter().map(|(name, value)| HeaderEntry { name, value }).collect())
        }
    }

    /// `continueRequest(overrides)`.
    pub async fn continue_request(&mut self, conn: &Connection, cdp_session: &str, overrides: RequestOverrides) -> Result<(), BidiError> {
        let fetch_id = self.require_fetch_id()?;
        let headers = self.header_entries(&overrides);
        let post_data = overrides.body.as_ref().map(|b| b.to_cdp_base64());
        conn.execute(
            Some(cdp_session),
            fetch::ContinueRequestParams { request_id: fetch_id, url: overrides.url.clone(), method: overrides.method.clone(), post_data, headers },
        )
        .await?;
        self.overrides = overrides;
        self.intercept_phase = None;
        Ok(())
    }

    /// `continueWithAuth(action)`.
    pub async fn continue_with_auth(&mut self, conn: &Connection, cdp_session: &str, response: AuthChallengeResponse) -> Result<(), BidiError> {
        let fetch_id = self.require_fetch_id()?;
        conn.execute(Some(cdp_session), fetch::ContinueWithAuthParams { request_id: fetch_id, auth_challenge_response: response })
            .await?;
        self.intercept_phase = None;
        Ok(())
    }

    /// `continueResponse(overrides)` — branches on `interceptPhase`:
    /// `authRequired` maps to `Fetch.continueWithAuth`, otherwise
    /// `Fetch.continueResponse`.
    pub async fn continue_response(
        &mut self,
        conn: &Connection,
        cdp_session: &str,
        status_code: Option<i64>,
        reason_phrase: Option<String>,
        headers: Option<Vec<HeaderEntry>>,
    ) -> Result<(), BidiError> {
        if matches!(self.intercept_phase, Some(InterceptPhase::AuthRequired)) {
            let response = AuthChallengeResponse { response: Some(AuthChallengeResponseResponse::Default), username: None, password: None };
            return self.continue_with_auth(conn, cdp_session, response).await;
        }
        let fetch_id = self.require_fetch_id()?;
        conn.execute(
            Some(cdp_session),
            fetch::ContinueResponseParams { request_id: fetch_id, response_code: status_code, response_phrase: reason_phrase, response_headers: headers },
        )
        .await?;
        self.intercept_phase = None;
        Ok(())
    }

    /// `provideResponse(overrides)`: `authRequired` delegates to
    /// `continueWithAuth(ProvideCredentials)`; no body/headers delegates to
    /// `continueRequest`; otherwise `Fetch.fulfillRequest`.
    #[allow(clippy::too_many_arguments)]
    pub async fn provide_response(
        &mut self,
        conn: &Connection,
        cdp_session: &str,
        status_code: Option<i64>,
        reason_phrase: Option<String>,
        headers: Option<Vec<HeaderEntry>>,
        body: Option<BodyOverride>,
        credentials: Option<(String, String)>,
    ) -> Result<(), BidiError> {
        if matches!(self.intercept_phase, Some(InterceptPhase::AuthRequired)) {
            let (username, password) = credentials.unzip();
            let response = AuthChallengeResponse { response: Some(AuthChallengeResponseResponse::ProvideCredentials), username, password };
            return self.continue_with_auth(conn, cdp_session, response).await;
        }
        if body.is_none() && headers.is_none() {
            let overrides = RequestOverrides { url: None, method: None, headers: None, cookies: None, body: None };
            return self.continue_request(conn, cdp_session, overrides).await;
        }
        let fetch_id = self.require_fetch_id()?;
        let body_b64 = body.as_ref().map(|b| b.to_cdp_base64());
        conn.execute(
            Some(cdp_session),
            fetch::FulfillRequestParams {
                request_id: fetch_id,
                response_code: status_code.unwrap_or(200),
                response_headers: headers,
                response_phrase: reason_phrase,
                body: body_b64,
            },
        )
        .await?;
        self.intercept_phase = None;
        Ok(())
    }

    /// `failRequest(errorReason)`.
    pub async fn fail_request(&mut self, conn: &Connection, cdp_session: &str, error_reason: ErrorReason) -> Result<(), BidiError> {
        let fetch_id = self.require_fetch_id()?;
        conn.execute(Some(cdp_session), fetch::FailRequestParams { request_id: fetch_id, error_reason }).await?;
        self.intercept_phase = None;
        Ok(())
    }
}

pub fn error_reason_from_str(reason: &str) -> Option<ErrorReason> {
    Some(match reason {
        "failed" => ErrorReason::Failed,
        "aborted" => ErrorReason::Aborted,
        "timedOut" => ErrorReason::TimedOut,
        "accessDenied" => ErrorReason::AccessDenied,
        "connectionClosed" => ErrorReason::ConnectionClosed,
        "connectionReset" => ErrorReason::ConnectionReset,
        "connectionRefused" => ErrorReason::ConnectionRefused,
        "connectionAborted" => ErrorReason::ConnectionAborted,
        "connectionFailed" => ErrorReason::ConnectionFailed,
        "nameNotResolved" => ErrorReason::NameNotResolved,
        "internetDisconnected" => ErrorReason::InternetDisconnected,
        "addressUnreachable" => ErrorReason::AddressUnreachable,
        "blockedByClient" => ErrorReason::BlockedByClient,
        "blockedByResponse" => ErrorReason::BlockedByResponse,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn before_request_sent_waits_for_extra_info_when_no_interception() {
        let mut req = NetworkRequest::new(RequestId("r1".into()));
        let emitted = req.evaluate(false, false);
        assert!(emitted.is_empty());

        req.apply_request_will_be_sent(
            RequestData { url: "https://example.test".into(), method: "GET".into(), ..Default::default() },
            None,
        );
        // info present but no extraInfo yet and not data:/cache.
        let emitted = req.evaluate(false, false);
        assert!(emitted.is_empty());

        req.apply_extra_info(Headers::new());
        let emitted = req.evaluate(false, false);
        assert_eq!(emitted, vec![NetworkEmission::BeforeRequestSent]);

        // Idempotent — already emitted.
        let emitted = req.evaluate(false, false);
        assert!(emitted.is_empty());
    }

    #[test]
    fn interception_gates_before_request_sent_on_paused_flag() {
        let mut req = NetworkRequest::new(RequestId("r2".into()));
        req.apply_request_will_be_sent(
            RequestData { url: "https://example.test/x".into(), method: "GET".into(), ..Default::default() },
            None,
        );
        req.apply_extra_info(Headers::new());
        // Interception expected, not yet paused — still gated.
        let emitted = req.evaluate(true, false);
        assert!(emitted.is_empty());

        req.apply_request_paused(bidicdp_cdp::fetch::FetchRequestId("f1".into()), false);
        let emitted = req.evaluate(true, false);
        assert_eq!(emitted, vec![NetworkEmission::BeforeRequestSent]);
    }

    #[test]
    fn data_url_skips_extra_info_gate() {
        let mut req = NetworkRequest::new(RequestId("r3".into()));
        req.apply_request_will_be_sent(
            RequestData { url: "data:text/plain,hi".into(), method: "GET".into(), ..Default::default() },
            None,
        );
        let emitted = req.evaluate(false, false);
        assert_eq!(emitted, vec![NetworkEmission::BeforeRequestSent]);
    }

    #[test]
    fn response_extra_info_discarded_when_it_belongs_to_redirect() {
        let mut req = NetworkRequest::new(RequestId("r4".into()));
        req.apply_request_will_be_sent(
            RequestData { url: "https://example.test/a".into(), method: "GET".into(), ..Default::default() },
            None,
        );
        req.apply_response_received(
            ResponseData { url: "https://example.test/a".into(), status: 302, ..Default::default() },
            true,
        );
        let mut redirect_headers = Headers::new();
        redirect_headers.insert("location".into(), "https://example.test/a".into());
        req.apply_response_extra_info(redirect_headers);
        assert!(req.response_extra_info.is_none());
    }
}
