use crate::state::AppState;
use crate::transport::Transport;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use sfu_relay_protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4().to_string();

    // Everything the hub sends this client goes through `tx`
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.hub.add_connection(&connection_id, tx).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                return;
            }
        }
        // Hub detached us
        let _ = sender.close().await;
    });

    if let Err(e) = state.relay.on_connect(&connection_id).await {
        tracing::error!("Connection {} could not open an SFU session: {}", connection_id, e);
        state.hub.remove_connection(&connection_id).await;
        let _ = send_task.await;
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let client_msg: ClientMessage = match serde_json::from_str(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::warn!("Invalid message from {}: {}", connection_id, e);
                            let notice = ServerMessage::Error {
                                message: "Invalid message format".to_string(),
                            };
                            let _ = state.hub.send_to(&connection_id, &notice).await;
                            continue;
                        }
                    };

                    state.relay.handle_message(&connection_id, client_msg).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::error!("WebSocket error for connection {}: {}", connection_id, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = &mut send_task => {
                tracing::debug!("Outbound stream of {} ended", connection_id);
                break;
            }
        }
    }

    state.relay.on_disconnect(&connection_id).await;
    state.hub.remove_connection(&connection_id).await;

    send_task.abort();

    tracing::info!("Connection {} disconnected from WebSocket", connection_id);
}
