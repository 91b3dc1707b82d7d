//! Relay orchestration
//!
//! Turns client events into registry updates, SFU session calls and
//! notifications. Every failure stops at this boundary: it is logged with
//! the connection id and operation and never takes the connection down.

use crate::error::{RelayError, Result};
use crate::registry::{ConnectionRegistry, PeerStreamIndex, RoomRegistry};
use crate::sfu::SfuSession;
use crate::state::SfuConfig;
use crate::transport::Transport;
use sfu_relay_protocol::{ClientMessage, ServerMessage};
use std::sync::Arc;

pub struct Relay {
    sfu: SfuConfig,
    transport: Arc<dyn Transport>,
    connections: Arc<ConnectionRegistry>,
    rooms: Arc<RoomRegistry>,
    streams: Arc<PeerStreamIndex>,
}

impl Relay {
    pub fn new(
        sfu: SfuConfig,
        transport: Arc<dyn Transport>,
        connections: Arc<ConnectionRegistry>,
        rooms: Arc<RoomRegistry>,
        streams: Arc<PeerStreamIndex>,
    ) -> Self {
        Self {
            sfu,
            transport,
            connections,
            rooms,
            streams,
        }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn streams(&self) -> &PeerStreamIndex {
        &self.streams
    }

    /// Open the SFU session for a new client and hand it its id.
    ///
    /// The session is only registered once the upstream socket is open, and
    /// is dropped again if the client cannot be greeted, so a failed connect
    /// leaves no trace in the registry.
    pub async fn on_connect(&self, connection_id: &str) -> Result<()> {
        let session = Arc::new(SfuSession::new(connection_id));
        session
            .connect(&self.sfu.url, self.sfu.connect_timeout, self.transport.clone())
            .await?;

        if let Err(e) = self.connections.put(connection_id, session.clone()).await {
            session.close().await;
            return Err(e);
        }

        let greeting = ServerMessage::ReceiveConnectionId {
            connection_id: connection_id.to_string(),
        };
        if let Err(e) = self.transport.send_to(connection_id, &greeting).await {
            if let Err(remove_err) = self.connections.remove(connection_id).await {
                tracing::debug!("Deregistering {}: {}", connection_id, remove_err);
            }
            session.close().await;
            return Err(e);
        }

        tracing::info!("Connection {} is proxied to the SFU", connection_id);
        Ok(())
    }

    /// Handle one client message. Errors are logged here and, where the
    /// client can act on them, reported back as an `error` notification.
    pub async fn handle_message(&self, connection_id: &str, message: ClientMessage) {
        let operation = message.kind();
        if let Err(e) = self.dispatch(connection_id, message).await {
            match e {
                RelayError::SessionClosed => {
                    tracing::debug!("Dropped {} from {}: session closed", operation, connection_id);
                }
                e => {
                    tracing::warn!("{} from {} failed: {}", operation, connection_id, e);
                    self.notify_error(connection_id, format!("{} failed: {}", operation, e))
                        .await;
                }
            }
        }
    }

    async fn dispatch(&self, connection_id: &str, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Join { room_id, offer } => self.join(connection_id, &room_id, offer).await,
            ClientMessage::Offer { sdp } => self.session(connection_id).await?.offer(sdp).await,
            ClientMessage::Answer { sdp } => self.session(connection_id).await?.answer(sdp).await,
            ClientMessage::Trickle { candidate } => {
                self.session(connection_id)
                    .await?
                    .trickle(candidate, 0)
                    .await
            }
            ClientMessage::SetStreamPeerId { stream_id } => {
                self.streams.bind(connection_id, &stream_id).await
            }
            ClientMessage::CreateRoom { room_id, name } => {
                let room = self.rooms.create(room_id, name).await;
                self.transport
                    .send_to(connection_id, &ServerMessage::RoomCreated { room })
                    .await
            }
            ClientMessage::LeaveRoom { room_id } => self.leave(connection_id, &room_id).await,
            ClientMessage::SendOffer { target, sdp } => {
                self.transport
                    .send_to(
                        &target,
                        &ServerMessage::ReceiveOffer {
                            from: connection_id.to_string(),
                            sdp,
                        },
                    )
                    .await
            }
            ClientMessage::SendAnswer { target, sdp } => {
                self.transport
                    .send_to(
                        &target,
                        &ServerMessage::ReceiveAnswer {
                            from: connection_id.to_string(),
                            sdp,
                        },
                    )
                    .await
            }
            ClientMessage::SendIceCandidate { target, candidate } => {
                self.transport
                    .send_to(
                        &target,
                        &ServerMessage::ReceiveIceCandidate {
                            from: connection_id.to_string(),
                            candidate,
                        },
                    )
                    .await
            }
            ClientMessage::SendOfferToRoom { room_id, sdp } => {
                let others = self.rooms.members(&room_id, Some(connection_id)).await?;
                self.transport
                    .send_to_many(
                        &others,
                        &ServerMessage::ReceiveOffer {
                            from: connection_id.to_string(),
                            sdp,
                        },
                    )
                    .await;
                Ok(())
            }
            ClientMessage::SendIceCandidateToRoom { room_id, candidate } => {
                let others = self.rooms.members(&room_id, Some(connection_id)).await?;
                self.transport
                    .send_to_many(
                        &others,
                        &ServerMessage::ReceiveIceCandidate {
                            from: connection_id.to_string(),
                            candidate,
                        },
                    )
                    .await;
                Ok(())
            }
            ClientMessage::Ping => {
                self.transport
                    .send_to(connection_id, &ServerMessage::Pong)
                    .await
            }
        }
    }

    async fn session(&self, connection_id: &str) -> Result<Arc<SfuSession>> {
        self.connections.get(connection_id).await
    }

    async fn join(&self, connection_id: &str, room_id: &str, offer: String) -> Result<()> {
        let session = self.session(connection_id).await?;

        // Switching rooms: drop out of the old one first
        if let Some(previous) = session.room_id().await {
            if previous != room_id {
                self.leave(connection_id, &previous).await?;
            }
        }

        let newly_joined = self.rooms.join(room_id, connection_id).await;

        if let Err(e) = session.join_room(room_id, connection_id, offer).await {
            // Membership follows whatever room the session still records
            if session.room_id().await.as_deref() != Some(room_id) {
                if let Err(leave_err) = self.rooms.leave(room_id, connection_id).await {
                    tracing::warn!(
                        "Could not undo membership of {} in room {}: {}",
                        connection_id,
                        room_id,
                        leave_err
                    );
                }
            }
            return Err(e);
        }

        if newly_joined {
            let others = self.rooms.members(room_id, Some(connection_id)).await?;
            self.transport
                .send_to_many(
                    &others,
                    &ServerMessage::PeerJoined {
                        connection_id: connection_id.to_string(),
                    },
                )
                .await;
        }

        tracing::info!("Connection {} joined room {}", connection_id, room_id);
        Ok(())
    }

    async fn leave(&self, connection_id: &str, room_id: &str) -> Result<()> {
        let session = self.session(connection_id).await?;
        if session.room_id().await.as_deref() != Some(room_id) {
            return Err(RelayError::NotFound(format!(
                "connection {} is not in room {}",
                connection_id, room_id
            )));
        }

        self.rooms.leave(room_id, connection_id).await?;
        session.take_room().await;

        if let Ok(others) = self.rooms.members(room_id, None).await {
            self.transport
                .send_to_many(
                    &others,
                    &ServerMessage::PeerLeft {
                        connection_id: connection_id.to_string(),
                    },
                )
                .await;
        }

        tracing::info!("Connection {} left room {}", connection_id, room_id);
        Ok(())
    }

    /// Tear down everything owned by a client connection.
    ///
    /// Each step runs regardless of the previous one failing. Peers are
    /// notified before the binding and session go away.
    pub async fn on_disconnect(&self, connection_id: &str) {
        let session = match self.connections.get(connection_id).await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!("Disconnect of unproxied connection {}: {}", connection_id, e);
                None
            }
        };

        let room_id = match &session {
            Some(session) => session.take_room().await,
            None => None,
        };

        if let Some(room_id) = &room_id {
            match self.rooms.members(room_id, Some(connection_id)).await {
                Ok(others) => {
                    self.transport
                        .send_to_many(
                            &others,
                            &ServerMessage::PeerDisconnected {
                                connection_id: connection_id.to_string(),
                            },
                        )
                        .await;
                }
                Err(e) => tracing::warn!(
                    "Could not notify room {} of {} leaving: {}",
                    room_id,
                    connection_id,
                    e
                ),
            }

            if let Err(e) = self.rooms.leave(room_id, connection_id).await {
                tracing::warn!("Failed to remove {} from room {}: {}", connection_id, room_id, e);
            }
        }

        match self.streams.unbind(connection_id).await {
            Ok(stream_id) => tracing::debug!("Released stream {} of {}", stream_id, connection_id),
            Err(RelayError::NotFound(_)) => {}
            Err(e) => tracing::warn!("Failed to unbind {}: {}", connection_id, e),
        }

        if let Some(session) = &session {
            session.close().await;
        }

        if let Err(e) = self.connections.remove(connection_id).await {
            tracing::debug!("Deregistering {}: {}", connection_id, e);
        }

        tracing::info!("Connection {} cleaned up", connection_id);
    }

    async fn notify_error(&self, connection_id: &str, message: String) {
        if let Err(e) = self
            .transport
            .send_to(connection_id, &ServerMessage::Error { message })
            .await
        {
            tracing::debug!("Could not report error to {}: {}", connection_id, e);
        }
    }
}
