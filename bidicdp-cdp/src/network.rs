//! `Network` domain: request/response lifecycle events consumed by the
//! network request state machine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::page::FrameId;
use crate::{impl_command, impl_event, impl_method, EmptyResponse};
use bidicdp_types::Method;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

pub type Headers = HashMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub has_post_data: bool,
    #[serde(default)]
    pub post_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub url: String,
    pub status: i64,
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub from_disk_cache: bool,
    #[serde(default)]
    pub from_service_worker: bool,
    #[serde(default)]
    pub encoded_data_length: f64,
    #[serde(default)]
    pub remote_ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestWillBeSent {
    pub request_id: RequestId,
    pub loader_id: String,
    pub document_url: String,
    pub request: RequestData,
    pub timestamp: f64,
    pub wall_time: f64,
    #[serde(default)]
    pub redirect_response: Option<ResponseData>,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
}
impl_method!(EventRequestWillBeSent, "Network.requestWillBeSent");
impl_event!(EventRequestWillBeSent);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestWillBeSentExtraInfo {
    pub request_id: RequestId,
    pub headers: Headers,
    #[serde(default)]
    pub associated_cookies: Vec<serde_json::Value>,
}
impl_method!(EventRequestWillBeSentExtraInfo, "Network.requestWillBeSentExtraInfo");
impl_event!(EventRequestWillBeSentExtraInfo);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponseReceived {
    pub request_id: RequestId,
    pub loader_id: String,
    pub timestamp: f64,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub response: ResponseData,
    #[serde(default)]
    pub has_extra_info: bool,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
}
impl_method!(EventResponseReceived, "Network.responseReceived");
impl_event!(EventResponseReceived);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponseReceivedExtraInfo {
    pub request_id: RequestId,
    pub headers: Headers,
    #[serde(default)]
    pub blocked_cookies: Vec<serde_json::Value>,
}
impl_method!(EventResponseReceivedExtraInfo, "Network.responseReceivedExtraInfo");
impl_event!(EventResponseReceivedExtraInfo);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestServedFromCache {
    pub request_id: RequestId,
}
impl_method!(EventRequestServedFromCache, "Network.requestServedFromCache");
impl_event!(EventRequestServedFromCache);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLoadingFailed {
    pub request_id: RequestId,
    pub timestamp: f64,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub error_text: String,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub blocked_reason: Option<String>,
}
impl_method!(EventLoadingFailed, "Network.loadingFailed");
impl_event!(EventLoadingFailed);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLoadingFinished {
    pub request_id: RequestId,
    pub timestamp: f64,
    #[serde(default)]
    pub encoded_data_length: f64,
}
impl_method!(EventLoadingFinished, "Network.loadingFinished");
impl_event!(EventLoadingFinished);

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnableParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_total_buffer_size: Option<i64>,
}
impl_command!(EnableParams, "Network.enable", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize)]
pub struct DisableParams {}
impl_command!(DisableParams, "Network.disable", EmptyResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponseBodyParams {
    pub request_id: RequestId,
}
#[derive(Debug, Clone, Deserialize)]
pub struct GetResponseBodyResponse {
    pub body: String,
    #[serde(rename = "base64Encoded")]
    pub base64_encoded: bool,
}
impl_command!(GetResponseBodyParams, "Network.getResponseBody", GetResponseBodyResponse);
