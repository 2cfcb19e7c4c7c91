//! The BiDi error taxonomy and the conversions that map errors from every
//! other layer (CDP transport, websocket, serde) into it.

use std::fmt;

use thiserror::Error;

/// The wire-visible error kind. Serializes to the exact strings the BiDi
/// wire protocol expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidiErrorKind {
    InvalidArgument,
    NoSuchFrame,
    NoSuchScript,
    NoSuchNode,
    InvalidSessionId,
    SessionNotCreated,
    UnknownCommand,
    UnsupportedOperation,
    UnableToSetCookie,
    UnderspecifiedStoragePartition,
    UnableToCaptureScreen,
    Unknown,
}

impl BidiErrorKind {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            BidiErrorKind::InvalidArgument => "invalid argument",
            BidiErrorKind::NoSuchFrame => "no such frame",
            BidiErrorKind::NoSuchScript => "no such script",
            BidiErrorKind::NoSuchNode => "no such node",
            BidiErrorKind::InvalidSessionId => "invalid session id",
            BidiErrorKind::SessionNotCreated => "session not created",
            BidiErrorKind::UnknownCommand => "unknown command",
            BidiErrorKind::UnsupportedOperation => "unsupported operation",
            BidiErrorKind::UnableToSetCookie => "unable to set cookie",
            BidiErrorKind::UnderspecifiedStoragePartition => "underspecified storage partition",
            BidiErrorKind::UnableToCaptureScreen => "unable to capture screen",
            BidiErrorKind::Unknown => "unknown error",
        }
    }
}

/// The error type threaded through every command processor and domain
/// store. Carries the wire-visible kind plus a human message and, where
/// useful, the underlying cause.
#[derive(Debug)]
pub struct BidiError {
    pub kind: BidiErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for BidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_wire_str(), self.message)
    }
}

impl std::error::Error for BidiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl BidiError {
    pub fn new(kind: BidiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::InvalidArgument, message)
    }

    pub fn no_such_frame(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::NoSuchFrame, message)
    }

    pub fn no_such_script(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::NoSuchScript, message)
    }

    pub fn no_such_node(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::NoSuchNode, message)
    }

    pub fn invalid_session_id(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::InvalidSessionId, message)
    }

    pub fn session_not_created(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::SessionNotCreated, message)
    }

    pub fn unknown_command(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::UnknownCommand, message)
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::UnsupportedOperation, message)
    }

    pub fn unable_to_set_cookie(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::UnableToSetCookie, message)
    }

    pub fn underspecified_storage_partition(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::UnderspecifiedStoragePartition, message)
    }

    pub fn unable_to_capture_screen(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::UnableToCaptureScreen, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(BidiErrorKind::Unknown, message)
    }
}

impl From<serde_json::Error> for BidiError {
    fn from(err: serde_json::Error) -> Self {
        BidiError {
            kind: BidiErrorKind::InvalidArgument,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<bidicdp_types::CdpProtocolError> for BidiError {
    fn from(err: bidicdp_types::CdpProtocolError) -> Self {
        // A close-error surfaces to the caller as `unknown error`; target
        // init is the only place that gives close-errors special treatment
        // (swallowed, not converted), see CdpTarget::create.
        BidiError {
            kind: BidiErrorKind::Unknown,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<CdpError> for BidiError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::Protocol(e) => e.into(),
            other => BidiError::unknown(other.to_string()),
        }
    }
}

/// Errors from the CDP connection itself (transport, serialization,
/// protocol-level failures reported by the browser).
#[derive(Debug, Error)]
pub enum CdpError {
    #[error("websocket error: {0}")]
    Ws(#[from] async_tungstenite::tungstenite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Protocol(#[from] bidicdp_types::CdpProtocolError),
    #[error("the CDP connection closed before a response arrived")]
    NoResponse,
    #[error("the CDP connection's send half was dropped")]
    ChannelClosed,
    #[error("failed to launch chrome: {0}")]
    Launch(String),
}

impl CdpError {
    /// Only a protocol error recognizable as "target went away" is
    /// swallowed during target init.
    pub fn is_close_error(&self) -> bool {
        match self {
            CdpError::Protocol(e) => e.is_close_error(),
            CdpError::NoResponse | CdpError::ChannelClosed => true,
            _ => false,
        }
    }
}
