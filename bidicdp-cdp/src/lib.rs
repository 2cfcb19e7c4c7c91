//! A narrow, hand-authored slice of the Chrome DevTools Protocol: only the
//! commands and events the BiDi translator actually issues or consumes
//! (`Target.*`, `Page.*`, `Runtime.*`, `Network.*`, `Fetch.*`, `Storage.*`,
//! `Browser.getVersion`, `DOM.resolveNode`, `Emulation.*`).
//!
//! Full-protocol code generation from the upstream PDL definitions is out of
//! scope; everything below is written by hand in the shape that generator
//! would have produced.

use std::borrow::Cow;

use bidicdp_types::Method;
use serde::{Deserialize, Serialize};

pub mod browser;
pub mod dom;
pub mod emulation;
pub mod fetch;
pub mod network;
pub mod page;
pub mod runtime;
pub mod storage;
pub mod target;

/// Implements [`bidicdp_types::Method`] for a params/event struct via its
/// fully qualified CDP identifier, e.g. `impl_method!(EnableParams,
/// "Network.enable")`.
macro_rules! impl_method {
    ($ty:ty, $id:literal) => {
        impl Method for $ty {
            fn identifier(&self) -> Cow<'static, str> {
                Cow::Borrowed($id)
            }
        }
    };
}

/// Implements [`bidicdp_types::Command`] in addition to `Method`.
macro_rules! impl_command {
    ($ty:ty, $id:literal, $resp:ty) => {
        impl_method!($ty, $id);
        impl bidicdp_types::Command for $ty {
            type Response = $resp;
        }
    };
}

/// Implements the marker [`bidicdp_types::Event`] trait for an event struct
/// that already has `Method` + `Deserialize` + `Debug`.
macro_rules! impl_event {
    ($ty:ty) => {
        impl bidicdp_types::Event for $ty {}
    };
}

pub(crate) use impl_command;
pub(crate) use impl_event;
pub(crate) use impl_method;

/// An empty response body, used by commands whose only observable effect is
/// the absence of an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// A fully-qualified CDP event, tagged by its method name and parsed into
/// the concrete shape the translator cares about. Anything that doesn't
/// match a known variant is forwarded verbatim via [`CdpEvent::Other`] — the
/// `cdp.eventReceived` relay relies on this to never drop an event.
#[derive(Debug, Clone)]
pub enum CdpEvent {
    TargetAttachedToTarget(target::EventAttachedToTarget),
    TargetDetachedFromTarget(target::EventDetachedFromTarget),
    TargetTargetCreated(target::EventTargetCreated),
    TargetTargetDestroyed(target::EventTargetDestroyed),
    TargetTargetCrashed(target::EventTargetCrashed),
    TargetTargetInfoChanged(target::EventTargetInfoChanged),

    PageFrameAttached(page::EventFrameAttached),
    PageFrameDetached(page::EventFrameDetached),
    PageFrameNavigated(page::EventFrameNavigated),
    PageLifecycleEvent(page::EventLifecycleEvent),
    PageJavascriptDialogOpening(page::EventJavascriptDialogOpening),

    RuntimeExecutionContextCreated(runtime::EventExecutionContextCreated),
    RuntimeExecutionContextDestroyed(runtime::EventExecutionContextDestroyed),
    RuntimeExecutionContextsCleared,

    NetworkRequestWillBeSent(network::EventRequestWillBeSent),
    NetworkRequestWillBeSentExtraInfo(network::EventRequestWillBeSentExtraInfo),
    NetworkResponseReceived(network::EventResponseReceived),
    NetworkResponseReceivedExtraInfo(network::EventResponseReceivedExtraInfo),
    NetworkRequestServedFromCache(network::EventRequestServedFromCache),
    NetworkLoadingFailed(network::EventLoadingFailed),
    NetworkLoadingFinished(network::EventLoadingFinished),

    FetchRequestPaused(fetch::EventRequestPaused),
    FetchAuthRequired(fetch::EventAuthRequired),

    /// Any CDP event this crate has no typed representation for. Still
    /// carries the raw method name and JSON params so the `cdp` wildcard
    /// stream can re-emit it unmodified.
    Other {
        method: Cow<'static, str>,
        params: serde_json::Value,
    },
}

impl CdpEvent {
    /// Parses a raw CDP event frame into the closest known variant,
    /// falling back to [`CdpEvent::Other`] for anything unrecognized.
    pub fn parse(method: &str, params: serde_json::Value) -> Self {
        macro_rules! try_parse {
            ($variant:ident, $ty:ty) => {
                if let Ok(ev) = serde_json::from_value::<$ty>(params.clone()) {
                    return CdpEvent::$variant(ev);
                }
            };
        }
        match method {
            "Target.attachedToTarget" => try_parse!(TargetAttachedToTarget, target::EventAttachedToTarget),
            "Target.detachedFromTarget" => try_parse!(TargetDetachedFromTarget, target::EventDetachedFromTarget),
            "Target.targetCreated" => try_parse!(TargetTargetCreated, target::EventTargetCreated),
            "Target.targetDestroyed" => try_parse!(TargetTargetDestroyed, target::EventTargetDestroyed),
            "Target.targetCrashed" => try_parse!(TargetTargetCrashed, target::EventTargetCrashed),
            "Target.targetInfoChanged" => try_parse!(TargetTargetInfoChanged, target::EventTargetInfoChanged),
            "Page.frameAttached" => try_parse!(PageFrameAttached, page::EventFrameAttached),
            "Page.frameDetached" => try_parse!(PageFrameDetached, page::EventFrameDetached),
            "Page.frameNavigated" => try_parse!(PageFrameNavigated, page::EventFrameNavigated),
            "Page.lifecycleEvent" => try_parse!(PageLifecycleEvent, page::EventLifecycleEvent),
            "Page.javascriptDialogOpening" => {
                try_parse!(PageJavascriptDialogOpening, page::EventJavascriptDialogOpening)
            }
            "Runtime.executionContextCreated" => {
                try_parse!(RuntimeExecutionContextCreated, runtime::EventExecutionContextCreated)
            }
            "Runtime.executionContextDestroyed" => {
                try_parse!(RuntimeExecutionContextDestroyed, runtime::EventExecutionContextDestroyed)
            }
            "Runtime.executionContextsCleared" => return CdpEvent::RuntimeExecutionContextsCleared,
            "Network.requestWillBeSent" => try_parse!(NetworkRequestWillBeSent, network::EventRequestWillBeSent),
            "Network.requestWillBeSentExtraInfo" => {
                try_parse!(NetworkRequestWillBeSentExtraInfo, network::EventRequestWillBeSentExtraInfo)
            }
            "Network.responseReceived" => try_parse!(NetworkResponseReceived, network::EventResponseReceived),
            "Network.responseReceivedExtraInfo" => {
                try_parse!(NetworkResponseReceivedExtraInfo, network::EventResponseReceivedExtraInfo)
            }
            "Network.requestServedFromCache" => {
                try_parse!(NetworkRequestServedFromCache, network::EventRequestServedFromCache)
            }
            "Network.loadingFailed" => try_parse!(NetworkLoadingFailed, network::EventLoadingFailed),
            "Network.loadingFinished" => try_parse!(NetworkLoadingFinished, network::EventLoadingFinished),
            "Fetch.requestPaused" => try_parse!(FetchRequestPaused, fetch::EventRequestPaused),
            "Fetch.authRequired" => try_parse!(FetchAuthRequired, fetch::EventAuthRequired),
            _ => {}
        }
        CdpEvent::Other {
            method: Cow::Owned(method.to_string()),
            params,
        }
    }
}
