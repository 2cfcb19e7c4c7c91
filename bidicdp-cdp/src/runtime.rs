//! `Runtime` domain: execution contexts, evaluation, remote objects.

use serde::{Deserialize, Serialize};

use crate::page::FrameId;
use crate::{impl_command, impl_event, impl_method, EmptyResponse};
use bidicdp_types::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionContextId(pub i64);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuxData {
    #[serde(rename = "frameId", default)]
    pub frame_id: Option<FrameId>,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
    #[serde(rename = "type", default)]
    pub world_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContextDescription {
    pub id: ExecutionContextId,
    pub origin: String,
    pub name: String,
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    #[serde(rename = "auxData", default)]
    pub aux_data: AuxData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventExecutionContextCreated {
    pub context: ExecutionContextDescription,
}
impl_method!(EventExecutionContextCreated, "Runtime.executionContextCreated");
impl_event!(EventExecutionContextCreated);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventExecutionContextDestroyed {
    pub execution_context_id: ExecutionContextId,
}
impl_method!(EventExecutionContextDestroyed, "Runtime.executionContextDestroyed");
impl_event!(EventExecutionContextDestroyed);

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnableParams {}
impl_command!(EnableParams, "Runtime.enable", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunIfWaitingForDebuggerParams {}
impl_command!(RunIfWaitingForDebuggerParams, "Runtime.runIfWaitingForDebugger", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ExecutionContextId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResponse {
    pub result: RemoteObject,
    #[serde(rename = "exceptionDetails", default)]
    pub exception_details: Option<serde_json::Value>,
}
impl_command!(EvaluateParams, "Runtime.evaluate", EvaluateResponse);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    pub function_declaration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<ExecutionContextId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}
#[derive(Debug, Clone, Deserialize)]
pub struct CallFunctionOnResponse {
    pub result: RemoteObject,
    #[serde(rename = "exceptionDetails", default)]
    pub exception_details: Option<serde_json::Value>,
}
impl_command!(CallFunctionOnParams, "Runtime.callFunctionOn", CallFunctionOnResponse);
