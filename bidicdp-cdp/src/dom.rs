//! `DOM` domain: only `resolveNode`, used to turn a BiDi `sharedId` back
//! into a CDP remote object for `script.callFunction` arguments.

use serde::{Deserialize, Serialize};

use crate::runtime::RemoteObject;
use crate::{impl_command, impl_method};
use bidicdp_types::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendNodeId(pub i64);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNodeParams {
    pub backend_node_id: BackendNodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveNodeResponse {
    pub object: RemoteObject,
}
impl_command!(ResolveNodeParams, "DOM.resolveNode", ResolveNodeResponse);
