use crate::error::{RelayError, Result};
use crate::transport::Transport;
use async_trait::async_trait;
use sfu_relay_protocol::{ConnectionId, ServerMessage};
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};

/// WebSocket-backed transport: one outbound queue per client socket
pub struct Hub {
    /// Map from connection ID to message sender channel
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_connection(
        &self,
        connection_id: &str,
        sender: mpsc::UnboundedSender<String>,
    ) {
        self.senders
            .write()
            .await
            .insert(connection_id.to_string(), sender);

        tracing::debug!("Client socket {} attached", connection_id);
    }

    pub async fn remove_connection(&self, connection_id: &str) {
        if self.senders.write().await.remove(connection_id).is_some() {
            tracing::debug!("Client socket {} detached", connection_id);
        }
    }

    pub async fn is_connected(&self, connection_id: &str) -> bool {
        self.senders.read().await.contains_key(connection_id)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for Hub {
    async fn send_to(&self, connection_id: &str, message: &ServerMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;

        let senders = self.senders.read().await;
        let sender = senders
            .get(connection_id)
            .ok_or_else(|| RelayError::NotFound(format!("connection {}", connection_id)))?;

        sender
            .send(json)
            .map_err(|_| RelayError::NotFound(format!("connection {} is closing", connection_id)))
    }

    async fn send_to_many(&self, connection_ids: &[ConnectionId], message: &ServerMessage) {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return;
            }
        };

        let senders = self.senders.read().await;
        tracing::debug!("Broadcasting to {} connections", connection_ids.len());

        for connection_id in connection_ids {
            match senders.get(connection_id) {
                Some(sender) => {
                    if let Err(e) = sender.send(json.clone()) {
                        tracing::error!("Failed to send message to {}: {}", connection_id, e);
                    }
                }
                None => tracing::debug!("Skipping detached connection {}", connection_id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_to_reaches_only_the_target() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.add_connection("A", tx_a).await;
        hub.add_connection("B", tx_b).await;

        hub.send_to("A", &ServerMessage::Pong).await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), r#"{"type":"pong"}"#);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_connection_is_not_found() {
        let hub = Hub::new();
        assert!(matches!(
            hub.send_to("ghost", &ServerMessage::Pong).await,
            Err(RelayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn send_to_many_skips_detached() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        hub.add_connection("A", tx_a).await;

        let msg = ServerMessage::PeerJoined {
            connection_id: "C".into(),
        };
        hub.send_to_many(&["A".to_string(), "B".to_string()], &msg).await;

        let received: ServerMessage = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(received, msg);

        hub.remove_connection("A").await;
        assert!(!hub.is_connected("A").await);
    }
}
