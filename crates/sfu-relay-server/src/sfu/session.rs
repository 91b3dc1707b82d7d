//! Per-connection SFU session
//!
//! Owns the upstream control socket for one client connection. Writes are
//! serialized by the sink lock so frames reach the SFU in call order; a
//! reader task forwards whatever the SFU pushes back to the owning client.

use crate::error::{RelayError, Result};
use crate::transport::Transport;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use sfu_relay_protocol::{ConnectionId, RoomId, SFU_PEER_ID, ServerMessage, SfuMessage, SfuRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpstreamSink = SplitSink<UpstreamSocket, Message>;
type UpstreamStream = SplitStream<UpstreamSocket>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, upstream socket not yet open
    Connecting,
    /// Upstream open, join not yet accepted by the SFU
    Joining,
    /// SFU answered our join
    Joined,
    Closing,
    Closed,
}

impl SessionState {
    fn is_closed(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    room_id: Option<RoomId>,
}

pub struct SfuSession {
    connection_id: ConnectionId,
    /// Shared with the reader task
    inner: Arc<RwLock<SessionInner>>,
    upstream: Mutex<Option<UpstreamSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SfuSession {
    /// Create a session in `Connecting` state; nothing is sent until `connect`
    pub fn new(connection_id: &str) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            inner: Arc::new(RwLock::new(SessionInner {
                state: SessionState::Connecting,
                room_id: None,
            })),
            upstream: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn room_id(&self) -> Option<RoomId> {
        self.inner.read().await.room_id.clone()
    }

    /// Open the upstream socket. Single attempt bounded by `connect_timeout`;
    /// on failure the session is closed and must be discarded.
    pub async fn connect(
        &self,
        sfu_url: &str,
        connect_timeout: Duration,
        transport: Arc<dyn Transport>,
    ) -> Result<()> {
        match self.state().await {
            SessionState::Connecting => {}
            state if state.is_closed() => return Err(RelayError::SessionClosed),
            _ => {
                return Err(RelayError::UpstreamUnavailable(
                    "session is already connected".to_string(),
                ));
            }
        }

        let socket = match tokio::time::timeout(connect_timeout, connect_async(sfu_url)).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                self.inner.write().await.state = SessionState::Closed;
                return Err(RelayError::UpstreamUnavailable(format!(
                    "connect to {} failed: {}",
                    sfu_url, e
                )));
            }
            Err(_) => {
                self.inner.write().await.state = SessionState::Closed;
                return Err(RelayError::UpstreamUnavailable(format!(
                    "connect to {} timed out after {:?}",
                    sfu_url, connect_timeout
                )));
            }
        };

        let (sink, stream) = socket.split();
        *self.upstream.lock().await = Some(sink);
        self.inner.write().await.state = SessionState::Joining;

        let reader = tokio::spawn(read_upstream(
            self.connection_id.clone(),
            self.inner.clone(),
            stream,
            transport,
        ));
        *self.reader.lock().await = Some(reader);

        tracing::info!("Connection {} opened SFU session to {}", self.connection_id, sfu_url);
        Ok(())
    }

    /// Ask the SFU to add `peer_id` to `room_id` with the given offer
    pub async fn join_room(&self, room_id: &str, peer_id: &str, offer: String) -> Result<()> {
        // Record the room first so an early answer from the SFU finds it
        let previous = {
            let mut inner = self.inner.write().await;
            if inner.state.is_closed() {
                return Err(RelayError::SessionClosed);
            }
            if inner.state == SessionState::Joined {
                inner.state = SessionState::Joining;
            }
            inner.room_id.replace(room_id.to_string())
        };

        let result = self
            .send(SfuRequest::Join {
                room_id: room_id.to_string(),
                peer_id: peer_id.to_string(),
                offer,
            })
            .await;

        if result.is_err() {
            self.inner.write().await.room_id = previous;
        }
        result
    }

    pub async fn offer(&self, sdp: String) -> Result<()> {
        self.send(SfuRequest::Offer { sdp }).await
    }

    pub async fn answer(&self, sdp: String) -> Result<()> {
        self.send(SfuRequest::Answer { sdp }).await
    }

    pub async fn trickle(&self, candidate: String, m_line_index: u16) -> Result<()> {
        self.send(SfuRequest::Trickle {
            candidate,
            m_line_index,
        })
        .await
    }

    /// Forget the current room locally, returning it
    pub async fn take_room(&self) -> Option<RoomId> {
        self.inner.write().await.room_id.take()
    }

    /// Close the upstream socket. Safe to call repeatedly and from any state.
    pub async fn close(&self) {
        let previous = {
            let mut inner = self.inner.write().await;
            let previous = inner.state;
            if previous != SessionState::Closed {
                inner.state = SessionState::Closing;
            }
            previous
        };

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }

        if let Some(mut sink) = self.upstream.lock().await.take() {
            if let Err(e) = sink.close().await {
                tracing::debug!(
                    "Error closing SFU socket for connection {}: {}",
                    self.connection_id,
                    e
                );
            }
        }

        self.inner.write().await.state = SessionState::Closed;
        if previous != SessionState::Closed {
            tracing::info!("Closed SFU session for connection {}", self.connection_id);
        }
    }

    /// Stop forwarding SFU pushes while keeping the upstream sink open
    #[cfg(test)]
    pub(crate) async fn stop_reader(&self) {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
    }

    async fn send(&self, request: SfuRequest) -> Result<()> {
        match self.state().await {
            SessionState::Connecting => {
                return Err(RelayError::UpstreamUnavailable(
                    "session is not connected".to_string(),
                ));
            }
            state if state.is_closed() => return Err(RelayError::SessionClosed),
            _ => {}
        }

        let kind = request.kind();
        let json = serde_json::to_string(&request)?;

        let mut upstream = self.upstream.lock().await;
        let sink = upstream.as_mut().ok_or(RelayError::SessionClosed)?;

        let sent = sink.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.inner.write().await.state = SessionState::Closing;
            upstream.take();
            drop(upstream);
            self.inner.write().await.state = SessionState::Closed;
            return Err(RelayError::UpstreamUnavailable(format!(
                "sending {} failed: {}",
                kind, e
            )));
        }

        tracing::debug!("Sent {} to SFU for connection {}", kind, self.connection_id);
        Ok(())
    }
}

/// Forward SFU pushes to the owning client until the socket ends
async fn read_upstream(
    connection_id: ConnectionId,
    inner: Arc<RwLock<SessionInner>>,
    mut stream: UpstreamStream,
    transport: Arc<dyn Transport>,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let sfu_msg: SfuMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("Invalid SFU message for connection {}: {}", connection_id, e);
                        continue;
                    }
                };

                let forward = match sfu_msg {
                    SfuMessage::Answer { sdp } => {
                        let mut guard = inner.write().await;
                        if guard.state == SessionState::Joining {
                            if let Some(room_id) = &guard.room_id {
                                tracing::info!(
                                    "SFU accepted join of connection {} to room {}",
                                    connection_id,
                                    room_id
                                );
                                guard.state = SessionState::Joined;
                            }
                        }
                        ServerMessage::ReceiveAnswer {
                            from: SFU_PEER_ID.to_string(),
                            sdp,
                        }
                    }
                    SfuMessage::Offer { sdp } => ServerMessage::ReceiveOffer {
                        from: SFU_PEER_ID.to_string(),
                        sdp,
                    },
                    SfuMessage::Trickle { candidate, .. } => ServerMessage::ReceiveIceCandidate {
                        from: SFU_PEER_ID.to_string(),
                        candidate,
                    },
                };

                if let Err(e) = transport.send_to(&connection_id, &forward).await {
                    tracing::warn!("Failed to forward SFU message to {}: {}", connection_id, e);
                }
            }
            Ok(Message::Close(frame)) => {
                tracing::info!("SFU closed session for connection {}: {:?}", connection_id, frame);
                break;
            }
            Err(e) => {
                tracing::warn!("SFU socket error for connection {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    // The stream is gone and the sink is released by `close` or a failed
    // send, so `Closing` has nothing left to do here.
    let unexpected = {
        let mut guard = inner.write().await;
        let unexpected = !guard.state.is_closed();
        guard.state = SessionState::Closed;
        unexpected
    };

    if unexpected {
        let notice = ServerMessage::Error {
            message: "SFU connection closed".to_string(),
        };
        if let Err(e) = transport.send_to(&connection_id, &notice).await {
            tracing::debug!("Could not tell {} about SFU loss: {}", connection_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_session_is_connecting() {
        let session = SfuSession::new("A");
        assert_eq!(session.state().await, SessionState::Connecting);
        assert_eq!(session.room_id().await, None);
        assert_eq!(session.connection_id(), "A");
    }

    #[tokio::test]
    async fn signaling_before_connect_is_unavailable() {
        let session = SfuSession::new("A");
        assert!(matches!(
            session.offer("v=0".into()).await,
            Err(RelayError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_signaling() {
        let session = SfuSession::new("A");
        session.close().await;
        session.close().await;
        assert_eq!(session.state().await, SessionState::Closed);

        assert!(matches!(
            session.trickle("candidate".into(), 0).await,
            Err(RelayError::SessionClosed)
        ));
        assert!(matches!(
            session.join_room("room1", "A", "v=0".into()).await,
            Err(RelayError::SessionClosed)
        ));
    }
}
