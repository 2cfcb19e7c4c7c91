//! Session Manager: the axum HTTP+WebSocket front end. `POST /session`
//! mints a session id and advertises its `webSocketUrl`; connecting to that
//! URL (or to `/session` directly, via the `session.new` fallback) launches
//! a fresh Chrome instance for the lifetime of the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::server;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

pub fn router(config: Arc<Config>) -> Router {
    let state = AppState { config };
    Router::new()
        .route("/session", any(session_root))
        .route("/session/:id", any(session_by_id))
        .route("/session/:id/*rest", any(session_subpath))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Arc<Config>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "bidi session manager listening");
    axum::serve(listener, router(config)).await
}

/// `POST /session` mints a session id; a websocket upgrade on the same path
/// is the `session.new`-over-`/session` fallback instead.
async fn session_root(State(state): State<AppState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(upgrade) => upgrade
            .on_upgrade(move |socket| server::handle_lazy(state.config, socket))
            .into_response(),
        None => {
            let id = Uuid::new_v4();
            let ws_url = format!("ws://127.0.0.1:{}/session/{}", state.config.port, id);
            Json(json!({
                "value": {
                    "sessionId": id.to_string(),
                    "capabilities": { "webSocketUrl": ws_url }
                }
            }))
            .into_response()
        }
    }
}

/// A websocket upgrade establishes the session and launches its browser; a
/// plain HTTP request against an already-minted session id is answered with
/// an empty value, as the classic WebDriver wire protocol expects for the
/// paths this translator doesn't implement as HTTP.
async fn session_by_id(State(state): State<AppState>, Path(_id): Path<String>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(upgrade) => upgrade
            .on_upgrade(move |socket| server::handle_established(state.config, socket))
            .into_response(),
        None => Json(json!({ "value": {} })).into_response(),
    }
}

async fn session_subpath(Path((_id, _rest)): Path<(String, String)>) -> Response {
    Json(json!({ "value": {} })).into_response()
}

async fn not_found() -> Response {
    axum::http::StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn ws_url_embeds_configured_port() {
        let mut config = Config::parse_from(["bidicdp"]);
        config.port = 4444;
        let id = Uuid::nil();
        let ws_url = format!("ws://127.0.0.1:{}/session/{}", config.port, id);
        assert_eq!(ws_url, "ws://127.0.0.1:4444/session/00000000-0000-0000-0000-000000000000");
    }
}
