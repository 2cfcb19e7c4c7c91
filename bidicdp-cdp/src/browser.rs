//! `Browser` domain: the single command this translator needs, version info.

use serde::{Deserialize, Serialize};

use crate::impl_command;
use bidicdp_types::Method;

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetVersionParams {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVersionResponse {
    pub protocol_version: String,
    pub product: String,
    pub revision: String,
    pub user_agent: String,
    pub js_version: String,
}
impl_command!(GetVersionParams, "Browser.getVersion", GetVersionResponse);
