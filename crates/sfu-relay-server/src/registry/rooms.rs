use crate::error::{RelayError, Result};
use chrono::{DateTime, Utc};
use sfu_relay_protocol::{ConnectionId, RoomData, RoomId};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Room {
    name: Option<String>,
    members: HashSet<ConnectionId>,
    created_at: DateTime<Utc>,
}

impl Room {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            members: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    fn to_data(&self, id: &str) -> RoomData {
        let mut members: Vec<ConnectionId> = self.members.iter().cloned().collect();
        members.sort();
        RoomData {
            id: id.to_string(),
            name: self.name.clone(),
            members,
            created_at: self.created_at,
        }
    }
}

/// Rooms and their member connections.
///
/// A room lives while it has members; the last `leave` retires it.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room explicitly. An existing room with the same id is
    /// returned unchanged.
    pub async fn create(&self, room_id: Option<RoomId>, name: Option<String>) -> RoomData {
        let room_id = room_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut rooms = self.rooms.write().await;

        let room = rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!("Created room {}", room_id);
            Room::new(name)
        });
        room.to_data(&room_id)
    }

    /// Add a connection to a room, creating the room on first join.
    /// Returns false when the connection was already a member.
    pub async fn join(&self, room_id: &str, connection_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_insert_with(|| {
            tracing::info!("Created room {} on first join", room_id);
            Room::new(None)
        });

        let added = room.members.insert(connection_id.to_string());
        if added {
            tracing::debug!(
                "Connection {} joined room {} ({} members)",
                connection_id,
                room_id,
                room.members.len()
            );
        }
        added
    }

    /// Remove a connection from a room, retiring the room once empty.
    /// Returns false when the connection was not a member.
    pub async fn leave(&self, room_id: &str, connection_id: &str) -> Result<bool> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| RelayError::NotFound(format!("room {}", room_id)))?;

        let removed = room.members.remove(connection_id);
        if room.members.is_empty() {
            rooms.remove(room_id);
            tracing::info!("Retired empty room {}", room_id);
        }
        Ok(removed)
    }

    /// Members of a room, optionally excluding one connection
    pub async fn members(&self, room_id: &str, except: Option<&str>) -> Result<Vec<ConnectionId>> {
        let rooms = self.rooms.read().await;
        let room = rooms
            .get(room_id)
            .ok_or_else(|| RelayError::NotFound(format!("room {}", room_id)))?;

        Ok(room
            .members
            .iter()
            .filter(|id| Some(id.as_str()) != except)
            .cloned()
            .collect())
    }

    pub async fn get(&self, room_id: &str) -> Result<RoomData> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|room| room.to_data(room_id))
            .ok_or_else(|| RelayError::NotFound(format!("room {}", room_id)))
    }

    pub async fn exists(&self, room_id: &str) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }
}
