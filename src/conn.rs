//! CDP Connection: one websocket to the browser's devtools endpoint.
//!
//! Maintains one websocket to the browser's devtools endpoint. Outgoing
//! commands are matched to their response via a monotonic [`CallId`];
//! incoming events are broadcast to per-session listeners. Modeled as a
//! pair of background tasks talking to the public API over channels,
//! rather than a hand-rolled `Stream` impl — command *processing* stays
//! logically serial per session, but I/O itself doesn't need to avoid real
//! concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_tungstenite::tokio::{connect_async, ConnectStream};
use async_tungstenite::tungstenite::Message as WsMessage;
use async_tungstenite::WebSocketStream;
use bidicdp_types::{CallId, CdpProtocolError, MethodCall, RawMessage};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, trace, warn};

use crate::error::CdpError;

/// Capacity of the per-connection raw-event broadcast channel. Sized
/// generously: slow listeners drop the oldest events rather than stall
/// the reader task (consistent with "no back-pressure" on the event queue —
/// the same posture extends to the lower-level CDP fan-out).
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// A raw CDP event frame tagged with the session it arrived on (`None` for
/// browser-level events such as `Target.targetCreated`).
#[derive(Debug, Clone)]
pub struct RawCdpEvent {
    pub session_id: Option<String>,
    pub method: String,
    pub params: serde_json::Value,
}

type PendingMap = Arc<Mutex<HashMap<CallId, oneshot::Sender<Result<serde_json::Value, CdpProtocolError>>>>>;

/// A live connection to the browser's devtools websocket.
pub struct Connection {
    to_writer: tokio::sync::mpsc::UnboundedSender<MethodCall>,
    pending: PendingMap,
    events: broadcast::Sender<RawCdpEvent>,
    next_id: AtomicUsize,
    _reader: tokio::task::JoinHandle<()>,
    _writer: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Connects to `ws_url` (the `webSocketDebuggerUrl` reported by the
    /// browser) and spawns the reader/writer tasks.
    pub async fn connect(ws_url: &str) -> Result<Self, CdpError> {
        debug!(ws_url, "connecting to CDP endpoint");
        let (ws, _) = connect_async(ws_url).await?;
        let (sink, stream) = ws.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let (to_writer, from_caller) = tokio::sync::mpsc::unbounded_channel();
        let writer = tokio::spawn(Self::write_loop(sink, from_caller));
        let reader = tokio::spawn(Self::read_loop(stream, pending.clone(), event_tx.clone()));

        Ok(Self {
            to_writer,
            pending,
            events: event_tx,
            next_id: AtomicUsize::new(0),
            _reader: reader,
            _writer: writer,
        })
    }

    async fn write_loop(
        mut sink: futures::stream::SplitSink<WebSocketStream<ConnectStream>, WsMessage>,
        mut from_caller: tokio::sync::mpsc::UnboundedReceiver<MethodCall>,
    ) {
        while let Some(call) = from_caller.recv().await {
            let text = match serde_json::to_string(&call) {
                Ok(t) => t,
                Err(err) => {
                    warn!(%err, "failed to serialize CDP command");
                    continue;
                }
            };
            trace!(%text, "-> cdp");
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    }

    async fn read_loop(
        mut stream: futures::stream::SplitStream<WebSocketStream<ConnectStream>>,
        pending: PendingMap,
        events: broadcast::Sender<RawCdpEvent>,
    ) {
        while let Some(msg) = stream.next().await {
            let msg = match msg {
                Ok(WsMessage::Text(t)) => t,
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            trace!(text = %msg, "<- cdp");
            let parsed: RawMessage = match serde_json::from_str(&msg) {
                Ok(p) => p,
                Err(err) => {
                    warn!(%err, raw = %msg, "failed to parse CDP frame");
                    continue;
                }
            };
            match parsed {
                RawMessage::Response(resp) => {
                    if let Some(tx) = pending.lock().remove(&resp.id) {
                        let result = match (resp.result, resp.error) {
                            (Some(v), _) => Ok(v),
                            (None, Some(e)) => Err(e),
                            (None, None) => Ok(serde_json::Value::Null),
                        };
                        let _ = tx.send(result);
                    }
                }
                RawMessage::Event(ev) => {
                    let _ = events.send(RawCdpEvent {
                        session_id: ev.session_id,
                        method: ev.method.into_owned(),
                        params: ev.params,
                    });
                }
            }
        }
        // Connection torn down: fail every still-pending command with a
        // close-error so callers don't hang forever.
        for (_, tx) in pending.lock().drain() {
            let _ = tx.send(Err(CdpProtocolError {
                code: -32000,
                message: "Target closed.".to_string(),
            }));
        }
    }

    fn next_call_id(&self) -> CallId {
        CallId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Sends a raw CDP command and awaits its response, optionally scoped to
    /// a CDP session (flat-session multiplexing).
    pub async fn send_command(
        &self,
        method: impl Into<std::borrow::Cow<'static, str>>,
        session_id: Option<&str>,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CdpError> {
        let id = self.next_call_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let call = MethodCall {
            id,
            session_id: session_id.map(|s| s.to_string()),
            method: method.into(),
            params,
        };
        self.to_writer
            .send(call)
            .map_err(|_| CdpError::ChannelClosed)?;
        match rx.await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(CdpError::Protocol(e)),
            Err(_) => Err(CdpError::NoResponse),
        }
    }

    /// Runs a typed [`bidicdp_types::Command`], serializing its params and
    /// deserializing its response.
    pub async fn execute<C>(&self, session_id: Option<&str>, cmd: C) -> Result<C::Response, CdpError>
    where
        C: bidicdp_types::Command,
    {
        let method = cmd.identifier();
        let params = serde_json::to_value(&cmd)?;
        let value = self.send_command(method, session_id, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribes to the raw event stream. Every listener receives every
    /// event regardless of session id; callers filter.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RawCdpEvent> {
        self.events.subscribe()
    }
}
