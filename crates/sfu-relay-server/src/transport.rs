use crate::error::Result;
use async_trait::async_trait;
use sfu_relay_protocol::{ConnectionId, ServerMessage};

/// Delivery of notifications to client connections.
///
/// The relay never talks to sockets directly; it addresses connections by id
/// through this capability. `Hub` is the WebSocket-backed implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Point-to-point send. Fails with `NotFound` for unknown connections.
    async fn send_to(&self, connection_id: &str, message: &ServerMessage) -> Result<()>;

    /// Fan-out send. Best effort: per-connection failures are logged only.
    async fn send_to_many(&self, connection_ids: &[ConnectionId], message: &ServerMessage) {
        for connection_id in connection_ids {
            if let Err(e) = self.send_to(connection_id, message).await {
                tracing::warn!("Failed to notify {}: {}", connection_id, e);
            }
        }
    }
}
