//! Relay server
//!
//! HTTP + WebSocket endpoints the host plugin (and extra MCP sessions)
//! talk to:
//!
//! - `GET /ws` duplex host socket
//! - `GET /poll` / `POST /push` polling fallback
//! - `POST /mcp` JSON-RPC over HTTP
//! - `GET /health`

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use canvas_relay_core::{McpServer, Relay, RelayMessage, RelayStatus};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct ServerState {
    relay: Arc<Relay>,
    mcp: Arc<McpServer>,
}

/// Build the router
pub fn router(relay: Arc<Relay>, mcp: Arc<McpServer>) -> Router {
    // The plugin UI runs in a sandboxed iframe with an opaque origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/poll", get(poll_handler))
        .route("/push", post(push_handler))
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .with_state(ServerState { relay, mcp })
        .layer(cors)
}

/// Bind to localhost on `port`
pub async fn bind(port: u16) -> Result<TcpListener, String> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {addr}: {e}"))
}

/// Serve until the listener fails
pub async fn serve(
    listener: TcpListener,
    relay: Arc<Relay>,
    mcp: Arc<McpServer>,
) -> Result<(), String> {
    if let Ok(addr) = listener.local_addr() {
        info!("Relay listening on http://{}", addr);
    }
    axum::serve(listener, router(relay, mcp))
        .await
        .map_err(|e| format!("Server error: {e}"))
}

async fn health_handler(State(state): State<ServerState>) -> Json<RelayStatus> {
    Json(state.relay.status().await)
}

async fn poll_handler(State(state): State<ServerState>) -> Json<RelayMessage> {
    Json(state.relay.poll().await)
}

async fn push_handler(State(state): State<ServerState>, body: String) -> Response {
    let message: Value = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Malformed push body");
            return push_rejected(format!("Invalid JSON: {e}"));
        }
    };
    match state.relay.receive(message).await {
        Ok(kind) => Json(json!({"ok": true, "kind": kind.as_str()})).into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected push");
            push_rejected(e.to_string())
        }
    }
}

fn push_rejected(error: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error": error})),
    )
        .into_response()
}

async fn mcp_handler(State(state): State<ServerState>, body: String) -> Response {
    match state.mcp.handle_line(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn ws_handler(State(state): State<ServerState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_host_socket(socket, state.relay))
}

/// Serve one host socket until it closes
async fn handle_host_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (connection_id, mut outbound) = match relay.connect_host().await {
        Ok(connected) => connected,
        Err(e) => {
            error!(error = %e, "Failed to register host socket");
            return;
        }
    };
    let (mut write, mut read) = socket.split();

    // Writer: drain frames queued for this connection
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        let message: Value = match frame {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(e) => {
                    warn!(connection = %connection_id, error = %e, "Malformed frame");
                    continue;
                }
            },
            Ok(Message::Binary(data)) => match serde_json::from_slice(&data) {
                Ok(message) => message,
                Err(e) => {
                    warn!(connection = %connection_id, error = %e, "Malformed frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(connection = %connection_id, error = %e, "Host socket read error");
                break;
            }
        };
        if let Err(e) = relay.receive(message).await {
            warn!(connection = %connection_id, error = %e, "Rejected host frame");
        }
    }

    writer.abort();
    relay.disconnect_host(&connection_id).await;
}
