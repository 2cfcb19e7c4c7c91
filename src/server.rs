//! BiDi Server: establishes a session for one WebSocket connection — either
//! immediately (a session id already minted by `POST /session`) or lazily,
//! waiting for a `session.new` command — then drives the read/dispatch/write
//! loop until the socket closes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::command::{self, CommandResponse};
use crate::config::Config;
use crate::conn::Connection;
use crate::error::BidiErrorKind;
use crate::events::OutgoingMessage;
use crate::launcher::ChromeProcess;
use crate::session::BidiSession;

/// A connection to `/session/<id>`: the browser is launched right away, so
/// the session is live before the first command arrives.
pub async fn handle_established(config: Arc<Config>, mut socket: WebSocket) {
    match launch_session(&config).await {
        Ok((chrome, session, outgoing)) => {
            run(session, socket, outgoing).await;
            drop(chrome);
        }
        Err(message) => {
            error!(%message, "failed to establish bidi session");
            let _ = socket.close().await;
        }
    }
}

/// A connection to `/session` directly: no browser exists yet. Every
/// command but `session.new` is rejected with `invalid session id` until
/// one arrives, at which point the browser is launched and the connection
/// hands off into the same read/dispatch/write loop.
pub async fn handle_lazy(config: Arc<Config>, mut socket: WebSocket) {
    loop {
        let text = match socket.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {
                let response = CommandResponse::Error {
                    id: None,
                    error: BidiErrorKind::InvalidArgument,
                    message: "only text frames carrying a bidi command are accepted".to_string(),
                    channel: None,
                };
                let _ = send(&mut socket, &response).await;
                continue;
            }
            Some(Err(err)) => {
                warn!(%err, "websocket read error before session established");
                return;
            }
        };

        let request = match command::parse_request(&text) {
            Ok(request) => request,
            Err(response) => {
                let _ = send(&mut socket, &response).await;
                continue;
            }
        };

        if request.method != "session.new" {
            let response = CommandResponse::Error {
                id: request.id,
                error: BidiErrorKind::InvalidSessionId,
                message: "no session established on this connection yet; send session.new first".to_string(),
                channel: request.channel,
            };
            let _ = send(&mut socket, &response).await;
            continue;
        }

        let (chrome, session, outgoing) = match launch_session(&config).await {
            Ok(parts) => parts,
            Err(message) => {
                let response = CommandResponse::Error {
                    id: request.id,
                    error: BidiErrorKind::SessionNotCreated,
                    message,
                    channel: request.channel,
                };
                let _ = send(&mut socket, &response).await;
                return;
            }
        };

        let response = command::dispatch(&session, request).await;
        if send(&mut socket, &response).await.is_err() {
            drop(chrome);
            return;
        }
        run(session, socket, outgoing).await;
        drop(chrome);
        return;
    }
}

async fn launch_session(
    config: &Arc<Config>,
) -> Result<(ChromeProcess, Arc<BidiSession>, mpsc::UnboundedReceiver<OutgoingMessage>), String> {
    let chrome = ChromeProcess::launch(config).await.map_err(|err| err.to_string())?;
    let conn = Connection::connect(&chrome.ws_url).await.map_err(|err| err.to_string())?;
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Arc::new(BidiSession::new(config.clone(), Arc::new(conn), tx));
    Ok((chrome, session, rx))
}

async fn send(socket: &mut WebSocket, response: &CommandResponse) -> Result<(), axum::Error> {
    socket.send(Message::Text(response.to_wire().to_string())).await
}

/// Alternates between client commands and outgoing BiDi events until the
/// socket closes or the client ends the session (`session.end`).
async fn run(session: Arc<BidiSession>, socket: WebSocket, mut outgoing: mpsc::UnboundedReceiver<OutgoingMessage>) {
    let engine_task = crate::engine::spawn(session.clone());
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match command::parse_request(&text) {
                            Ok(request) => {
                                let ends_session = request.method == "session.end";
                                let response = command::dispatch(&session, request).await;
                                if sink.send(Message::Text(response.to_wire().to_string())).await.is_err() {
                                    break;
                                }
                                if ends_session {
                                    break;
                                }
                            }
                            Err(response) => {
                                if sink.send(Message::Text(response.to_wire().to_string())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        let response = CommandResponse::Error {
                            id: None,
                            error: BidiErrorKind::InvalidArgument,
                            message: "only text frames carrying a bidi command are accepted".to_string(),
                            channel: None,
                        };
                        if sink.send(Message::Text(response.to_wire().to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(%err, "websocket read error");
                        break;
                    }
                }
            }
            Some(event) = outgoing.recv() => {
                let mut payload = serde_json::json!({
                    "type": "event",
                    "method": event.method,
                    "params": event.params,
                });
                if let Some(channel) = &event.channel {
                    payload["channel"] = serde_json::Value::String(channel.clone());
                }
                if sink.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }

    engine_task.abort();
    debug!(session_id = %session.id, "bidi session ended");
}
