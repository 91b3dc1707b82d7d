use crate::error::{RelayError, Result};
use sfu_relay_protocol::{ConnectionId, StreamId};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Bindings {
    stream_by_peer: HashMap<ConnectionId, StreamId>,
    peer_by_stream: HashMap<StreamId, ConnectionId>,
}

/// Bijection between peer connection ids and SFU stream ids.
///
/// Both directions live behind one lock so a bind or unbind is never
/// observable half-applied.
#[derive(Default)]
pub struct PeerStreamIndex {
    bindings: RwLock<Bindings>,
}

impl PeerStreamIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a peer to a stream. Rebinding the same pair is a no-op; any other
    /// overlap is rejected rather than overwritten.
    pub async fn bind(&self, peer_id: &str, stream_id: &str) -> Result<()> {
        let mut bindings = self.bindings.write().await;

        let current_stream = bindings.stream_by_peer.get(peer_id);
        let current_peer = bindings.peer_by_stream.get(stream_id);

        match (current_stream, current_peer) {
            (Some(s), Some(p)) if s == stream_id && p == peer_id => return Ok(()),
            (None, None) => {}
            _ => {
                return Err(RelayError::AlreadyBound {
                    peer: peer_id.to_string(),
                    stream: stream_id.to_string(),
                });
            }
        }

        bindings
            .stream_by_peer
            .insert(peer_id.to_string(), stream_id.to_string());
        bindings
            .peer_by_stream
            .insert(stream_id.to_string(), peer_id.to_string());

        tracing::debug!("Bound peer {} to stream {}", peer_id, stream_id);
        Ok(())
    }

    pub async fn stream_of(&self, peer_id: &str) -> Result<StreamId> {
        self.bindings
            .read()
            .await
            .stream_by_peer
            .get(peer_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(format!("stream for peer {}", peer_id)))
    }

    pub async fn peer_of(&self, stream_id: &str) -> Result<ConnectionId> {
        self.bindings
            .read()
            .await
            .peer_by_stream
            .get(stream_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(format!("peer for stream {}", stream_id)))
    }

    /// Remove the binding of a peer, returning the stream it held
    pub async fn unbind(&self, peer_id: &str) -> Result<StreamId> {
        let mut bindings = self.bindings.write().await;
        let stream_id = bindings
            .stream_by_peer
            .remove(peer_id)
            .ok_or_else(|| RelayError::NotFound(format!("stream for peer {}", peer_id)))?;
        bindings.peer_by_stream.remove(&stream_id);

        tracing::debug!("Unbound peer {} from stream {}", peer_id, stream_id);
        Ok(stream_id)
    }

    /// Remove the binding of a stream, returning the peer it belonged to
    pub async fn unbind_stream(&self, stream_id: &str) -> Result<ConnectionId> {
        let mut bindings = self.bindings.write().await;
        let peer_id = bindings
            .peer_by_stream
            .remove(stream_id)
            .ok_or_else(|| RelayError::NotFound(format!("peer for stream {}", stream_id)))?;
        bindings.stream_by_peer.remove(&peer_id);

        tracing::debug!("Unbound stream {} from peer {}", stream_id, peer_id);
        Ok(peer_id)
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.stream_by_peer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_is_visible_in_both_directions() {
        let index = PeerStreamIndex::new();
        index.bind("A", "streamX").await.unwrap();

        assert_eq!(index.stream_of("A").await.unwrap(), "streamX");
        assert_eq!(index.peer_of("streamX").await.unwrap(), "A");
    }

    #[tokio::test]
    async fn conflicting_binds_are_rejected() {
        let index = PeerStreamIndex::new();
        index.bind("A", "streamX").await.unwrap();

        // Another peer claiming the same stream
        let err = index.bind("B", "streamX").await.unwrap_err();
        assert!(matches!(err, RelayError::AlreadyBound { .. }));

        // Same peer claiming a second stream
        let err = index.bind("A", "streamY").await.unwrap_err();
        assert!(matches!(err, RelayError::AlreadyBound { .. }));

        assert_eq!(index.stream_of("A").await.unwrap(), "streamX");
        assert!(index.stream_of("B").await.is_err());
        assert!(index.peer_of("streamY").await.is_err());
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn rebinding_same_pair_is_noop() {
        let index = PeerStreamIndex::new();
        index.bind("A", "streamX").await.unwrap();
        index.bind("A", "streamX").await.unwrap();
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn unbind_clears_both_directions() {
        let index = PeerStreamIndex::new();
        index.bind("A", "streamX").await.unwrap();
        index.bind("B", "streamY").await.unwrap();

        assert_eq!(index.unbind("A").await.unwrap(), "streamX");
        assert!(matches!(
            index.peer_of("streamX").await,
            Err(RelayError::NotFound(_))
        ));

        assert_eq!(index.unbind_stream("streamY").await.unwrap(), "B");
        assert!(index.stream_of("B").await.is_err());
        assert_eq!(index.len().await, 0);

        // Freed ids are reusable
        index.bind("B", "streamX").await.unwrap();
        assert_eq!(index.peer_of("streamX").await.unwrap(), "B");
    }

    #[tokio::test]
    async fn unbind_unknown_peer_is_not_found() {
        let index = PeerStreamIndex::new();
        assert!(matches!(index.unbind("ghost").await, Err(RelayError::NotFound(_))));
    }
}
