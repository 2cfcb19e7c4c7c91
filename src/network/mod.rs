//! Network subsystem: the per-request state machine and the store that
//! owns live requests and intercepts.

pub mod request;
pub mod storage;

pub use request::{error_reason_from_str, BodyOverride, InterceptPhase, NetworkEmission, NetworkRequest, RequestOverrides};
pub use storage::{Intercept, NetworkStorage, PendingPauseRecord};
