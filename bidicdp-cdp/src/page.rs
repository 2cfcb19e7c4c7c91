//! `Page` domain: lifecycle events, frame tree, navigation, preload scripts.

use serde::{Deserialize, Serialize};

use crate::{impl_command, impl_event, impl_method, EmptyResponse};
use bidicdp_types::Method;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub id: FrameId,
    #[serde(default)]
    pub parent_id: Option<FrameId>,
    pub url: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameAttached {
    pub frame_id: FrameId,
    pub parent_frame_id: FrameId,
}
impl_method!(EventFrameAttached, "Page.frameAttached");
impl_event!(EventFrameAttached);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameDetached {
    pub frame_id: FrameId,
    #[serde(default)]
    pub reason: Option<String>,
}
impl_method!(EventFrameDetached, "Page.frameDetached");
impl_event!(EventFrameDetached);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrameNavigated {
    pub frame: FrameInfo,
}
impl_method!(EventFrameNavigated, "Page.frameNavigated");
impl_event!(EventFrameNavigated);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLifecycleEvent {
    pub frame_id: FrameId,
    pub name: String,
    pub timestamp: f64,
}
impl_method!(EventLifecycleEvent, "Page.lifecycleEvent");
impl_event!(EventLifecycleEvent);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventJavascriptDialogOpening {
    pub url: String,
    pub message: String,
    #[serde(rename = "type")]
    pub dialog_type: String,
}
impl_method!(EventJavascriptDialogOpening, "Page.javascriptDialogOpening");
impl_event!(EventJavascriptDialogOpening);

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnableParams {}
impl_command!(EnableParams, "Page.enable", EmptyResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLifecycleEventsEnabledParams {
    pub enabled: bool,
}
impl_command!(SetLifecycleEventsEnabledParams, "Page.setLifecycleEventsEnabled", EmptyResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateParams {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<FrameId>,
}
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResponse {
    pub frame_id: FrameId,
    #[serde(default)]
    pub error_text: Option<String>,
}
impl_command!(NavigateParams, "Page.navigate", NavigateResponse);

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReloadParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_cache: Option<bool>,
}
impl_command!(ReloadParams, "Page.reload", EmptyResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddScriptToEvaluateOnNewDocumentParams {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_immediately: Option<bool>,
}
#[derive(Debug, Clone, Deserialize)]
pub struct AddScriptToEvaluateOnNewDocumentResponse {
    pub identifier: String,
}
impl_command!(
    AddScriptToEvaluateOnNewDocumentParams,
    "Page.addScriptToEvaluateOnNewDocument",
    AddScriptToEvaluateOnNewDocumentResponse
);

#[derive(Debug, Clone, Serialize)]
pub struct RemoveScriptToEvaluateOnNewDocumentParams {
    pub identifier: String,
}
impl_command!(
    RemoveScriptToEvaluateOnNewDocumentParams,
    "Page.removeScriptToEvaluateOnNewDocument",
    EmptyResponse
);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScreenshotParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
}
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureScreenshotResponse {
    pub data: String,
}
impl_command!(CaptureScreenshotParams, "Page.captureScreenshot", CaptureScreenshotResponse);

#[derive(Debug, Clone, Default, Serialize)]
pub struct BringToFrontParams {}
impl_command!(BringToFrontParams, "Page.bringToFront", EmptyResponse);
