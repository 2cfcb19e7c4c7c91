//! `Emulation` domain: viewport overrides for `browsingContext.setViewport`.

use serde::Serialize;

use crate::{impl_command, impl_method, EmptyResponse};
use bidicdp_types::Method;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDeviceMetricsOverrideParams {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}
impl_command!(SetDeviceMetricsOverrideParams, "Emulation.setDeviceMetricsOverride", EmptyResponse);

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearDeviceMetricsOverrideParams {}
impl_command!(ClearDeviceMetricsOverrideParams, "Emulation.clearDeviceMetricsOverride", EmptyResponse);
