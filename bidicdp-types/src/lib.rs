//! Essential wire types shared by the CDP connection and the hand-authored
//! protocol crate. Kept separate from the rest of the workspace so the
//! connection layer doesn't need to depend on every generated protocol type.

use std::borrow::Cow;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identifier for a CDP session, as returned by `Target.attachedToTarget`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier for a single outstanding CDP command. Unique per connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(usize);

impl CallId {
    pub fn new(id: usize) -> Self {
        CallId(id)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

/// A method identifier together with its domain, e.g. `Network.enable`.
pub trait Method {
    fn identifier(&self) -> Cow<'static, str>;

    fn domain_name(&self) -> Cow<'static, str> {
        self.split().0
    }

    fn method_name(&self) -> Cow<'static, str> {
        self.split().1
    }

    fn split(&self) -> (Cow<'static, str>, Cow<'static, str>) {
        let id = self.identifier();
        let mut iter = id.split('.');
        let domain = iter.next().unwrap_or_default().to_string();
        let method = iter.next().unwrap_or_default().to_string();
        (Cow::Owned(domain), Cow::Owned(method))
    }
}

/// A typed CDP command: a serializable request paired with its expected
/// response type.
pub trait Command: Serialize + Method {
    type Response: DeserializeOwned + fmt::Debug;
}

/// A typed CDP event, keyed by the session it was observed on.
pub trait Event: Method + DeserializeOwned + fmt::Debug {}

/// The envelope sent to the browser's devtools websocket.
#[derive(Debug, Clone, Serialize)]
pub struct MethodCall {
    pub id: CallId,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub method: Cow<'static, str>,
    pub params: serde_json::Value,
}

/// A CDP protocol-level error, as embedded in a failed command response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdpProtocolError {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for CdpProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDP error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for CdpProtocolError {}

impl CdpProtocolError {
    /// Chrome reports a detached/closed target through a handful of
    /// recognizable error strings rather than a dedicated code. Matching on
    /// message content mirrors what the browser actually sends.
    pub fn is_close_error(&self) -> bool {
        let m = self.message.to_ascii_lowercase();
        m.contains("target closed")
            || m.contains("session with given id not found")
            || m.contains("no target with given id found")
            || m.contains("inspected target navigated or closed")
    }
}

/// The raw response frame for a single command call.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub id: CallId,
    pub result: Option<serde_json::Value>,
    pub error: Option<CdpProtocolError>,
}

/// The raw event frame as received over the websocket, before it is parsed
/// into a concrete [`Event`] type by the protocol crate's dispatch table.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub method: Cow<'static, str>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    pub params: serde_json::Value,
}

/// Either a command response or an event, exactly as CDP multiplexes them
/// onto a single websocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMessage {
    Response(RawResponse),
    Event(RawEvent),
}

pub type CommandResult<T> = Result<T, CdpProtocolError>;
