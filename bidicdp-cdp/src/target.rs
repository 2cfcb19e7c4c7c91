//! `Target` domain: target discovery, attach/detach, target creation.

use serde::{Deserialize, Serialize};

use crate::{impl_command, impl_event, impl_method, EmptyResponse};
use bidicdp_types::{Method, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowserContextId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    Page,
    Iframe,
    Worker,
    SharedWorker,
    ServiceWorker,
    Browser,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: TargetId,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    pub attached: bool,
    #[serde(default)]
    pub opener_id: Option<TargetId>,
    #[serde(default)]
    pub browser_context_id: Option<BrowserContextId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttachedToTarget {
    pub session_id: SessionId,
    pub target_info: TargetInfo,
    pub waiting_for_debugger: bool,
}
impl_method!(EventAttachedToTarget, "Target.attachedToTarget");
impl_event!(EventAttachedToTarget);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetachedFromTarget {
    pub session_id: SessionId,
    #[serde(default)]
    pub target_id: Option<TargetId>,
}
impl_method!(EventDetachedFromTarget, "Target.detachedFromTarget");
impl_event!(EventDetachedFromTarget);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTargetCreated {
    #[serde(rename = "targetInfo")]
    pub target_info: TargetInfo,
}
impl_method!(EventTargetCreated, "Target.targetCreated");
impl_event!(EventTargetCreated);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTargetDestroyed {
    pub target_id: TargetId,
}
impl_method!(EventTargetDestroyed, "Target.targetDestroyed");
impl_event!(EventTargetDestroyed);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTargetCrashed {
    pub target_id: TargetId,
    pub status: String,
    pub error_code: i64,
}
impl_method!(EventTargetCrashed, "Target.targetCrashed");
impl_event!(EventTargetCrashed);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTargetInfoChanged {
    #[serde(rename = "targetInfo")]
    pub target_info: TargetInfo,
}
impl_method!(EventTargetInfoChanged, "Target.targetInfoChanged");
impl_event!(EventTargetInfoChanged);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAutoAttachParams {
    pub auto_attach: bool,
    pub wait_for_debugger_on_start: bool,
    pub flatten: bool,
}
impl_command!(SetAutoAttachParams, "Target.setAutoAttach", EmptyResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDiscoverTargetsParams {
    pub discover: bool,
}
impl_command!(SetDiscoverTargetsParams, "Target.setDiscoverTargets", EmptyResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetParams {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<BrowserContextId>,
}
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResponse {
    pub target_id: TargetId,
}
impl_command!(CreateTargetParams, "Target.createTarget", CreateTargetResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTargetParams {
    pub target_id: TargetId,
}
#[derive(Debug, Clone, Deserialize)]
pub struct CloseTargetResponse {
    pub success: bool,
}
impl_command!(CloseTargetParams, "Target.closeTarget", CloseTargetResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateTargetParams {
    pub target_id: TargetId,
}
impl_command!(ActivateTargetParams, "Target.activateTarget", EmptyResponse);
