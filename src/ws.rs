//! Transport adapter: one axum WebSocket connection per client (§2.1, §6).
//!
//! Each connection gets a fresh [`ConnId`] and an `mpsc` outbox. A read task decodes
//! incoming text frames and feeds them to the Dispatcher one at a time (preserving
//! per-connection arrival order, §5); a write task drains the outbox and forwards
//! frames to the socket. Either half ending tears down the connection and runs the
//! disconnect cleanup path (§8 scenario 7).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::{dispatch, handle_disconnect};
use crate::registry::{ConnId, Registry};

pub async fn ws_handler(
    State(registry): State<Arc<Registry>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<Registry>) {
    let conn = ConnId(Uuid::new_v4());
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<crate::protocol::ServerMessage>();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(text) => {
                dispatch(&registry, conn, &tx, &text).await;
            }
            Message::Close(_) => break,
            _ => {
                // Binary/ping/pong frames carry no envelope; treated as malformed (§6).
                warn!("dropping non-text frame");
            }
        }
    }

    info!(?conn, "connection closed");
    handle_disconnect(&registry, conn).await;
    write_task.abort();
}
