//! WebSocket connection loop
//!
//! Inbound frames on one connection are handled in arrival order; a writer
//! task drains the connection's outbound queue into the socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use super::{disconnect, process_frame};
use crate::config::AppState;
use crate::session::ConnectionHandle;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut outbound) = ConnectionHandle::channel();
    let conn = handle.id();
    debug!("[Ws] Connection {} opened", conn);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = match frame.to_text() {
                Ok(text) => text,
                Err(e) => {
                    warn!("[Ws] Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => process_frame(&state, &handle, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("[Ws] Receive error on {}: {}", conn, e);
                break;
            }
        }
    }

    disconnect(&state, &handle);
    drop(handle);
    if writer.await.is_err() {
        warn!("[Ws] Writer task for {} panicked", conn);
    }
    debug!("[Ws] Connection {} closed", conn);
}
