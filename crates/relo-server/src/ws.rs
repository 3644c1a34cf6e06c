//! WebSocket endpoint for extension agents.
//!
//! Each accepted socket registers itself with the manager task and then pumps
//! frames in both directions until either side goes away. The manager replaces
//! its tracked connection on every registration; the superseded socket task
//! notices its outbound channel closing and exits.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;

use crate::manager::{ConnectionHandle, ManagerEvent};
use crate::state::AppState;

/// Handle WebSocket upgrade for an extension agent.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Pump an established agent connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (handle, mut outbound) = ConnectionHandle::new();
    if state
        .manager
        .send(ManagerEvent::Connected(handle))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            // Forward reload commands to the agent
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Manager replaced this connection
                    None => break,
                }
            }
            // Forward agent messages to the manager
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(raw))) => {
                        let _ = state
                            .manager
                            .send(ManagerEvent::Inbound(raw.as_str().to_owned()))
                            .await;
                    }
                    // Pings and pongs are handled by axum; binary is not
                    // part of the protocol
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}
