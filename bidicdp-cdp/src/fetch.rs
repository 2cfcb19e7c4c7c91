//! `Fetch` domain: request interception, auth challenges.

use serde::{Deserialize, Serialize};

use crate::network::{Headers, RequestData, RequestId};
use crate::page::FrameId;
use crate::{impl_command, impl_event, impl_method, EmptyResponse};
use bidicdp_types::Method;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequestId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RequestStage {
    Request,
    Response,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPattern {
    #[serde(rename = "urlPattern", skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(rename = "requestStage", skip_serializing_if = "Option::is_none")]
    pub request_stage: Option<RequestStage>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<RequestPattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_auth_requests: Option<bool>,
}
impl_command!(EnableParams, "Fetch.enable", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize)]
pub struct DisableParams {}
impl_command!(DisableParams, "Fetch.disable", EmptyResponse);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestPaused {
    pub request_id: FetchRequestId,
    pub request: RequestData,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
    #[serde(rename = "resourceType", default)]
    pub resource_type: Option<String>,
    #[serde(rename = "responseStatusCode", default)]
    pub response_status_code: Option<i64>,
    #[serde(rename = "responseHeaders", default)]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(rename = "networkId", default)]
    pub network_id: Option<RequestId>,
}
impl_method!(EventRequestPaused, "Fetch.requestPaused");
impl_event!(EventRequestPaused);

impl EventRequestPaused {
    /// A paused frame carries response fields iff CDP observed them before
    /// pausing — this is what distinguishes a request-phase pause from a
    /// response-phase pause.
    pub fn is_response_phase(&self) -> bool {
        self.response_status_code.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthChallengeSource {
    Server,
    Proxy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    #[serde(default)]
    pub source: Option<AuthChallengeSource>,
    pub origin: String,
    pub scheme: String,
    pub realm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAuthRequired {
    pub request_id: FetchRequestId,
    pub request: RequestData,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
    #[serde(rename = "resourceType", default)]
    pub resource_type: Option<String>,
    #[serde(rename = "authChallenge")]
    pub auth_challenge: AuthChallenge,
}
impl_method!(EventAuthRequired, "Fetch.authRequired");
impl_event!(EventAuthRequired);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueRequestParams {
    pub request_id: FetchRequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderEntry>>,
}
impl_command!(ContinueRequestParams, "Fetch.continueRequest", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResponseParams {
    pub request_id: FetchRequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_phrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
}
impl_command!(ContinueResponseParams, "Fetch.continueResponse", EmptyResponse);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AuthChallengeResponseResponse {
    Default,
    CancelAuth,
    ProvideCredentials,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallengeResponse {
    pub response: Option<AuthChallengeResponseResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueWithAuthParams {
    pub request_id: FetchRequestId,
    pub auth_challenge_response: AuthChallengeResponse,
}
impl_command!(ContinueWithAuthParams, "Fetch.continueWithAuth", EmptyResponse);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorReason {
    Failed,
    Aborted,
    TimedOut,
    AccessDenied,
    ConnectionClosed,
    ConnectionReset,
    ConnectionRefused,
    ConnectionAborted,
    ConnectionFailed,
    NameNotResolved,
    InternetDisconnected,
    AddressUnreachable,
    BlockedByClient,
    BlockedByResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailRequestParams {
    pub request_id: FetchRequestId,
    pub error_reason: ErrorReason,
}
impl_command!(FailRequestParams, "Fetch.failRequest", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillRequestParams {
    pub request_id: FetchRequestId,
    pub response_code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_phrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
impl_command!(FulfillRequestParams, "Fetch.fulfillRequest", EmptyResponse);
