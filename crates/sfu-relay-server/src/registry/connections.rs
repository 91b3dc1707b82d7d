use crate::error::{RelayError, Result};
use crate::sfu::SfuSession;
use sfu_relay_protocol::ConnectionId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Client connection id to its SFU session.
///
/// A connection is proxied exactly when it has an entry here.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<ConnectionId, Arc<SfuSession>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, connection_id: &str, session: Arc<SfuSession>) -> Result<()> {
        match self.sessions.write().await.entry(connection_id.to_string()) {
            Entry::Occupied(_) => Err(RelayError::DuplicateConnection(connection_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(session);
                tracing::debug!("Registered SFU session for connection {}", connection_id);
                Ok(())
            }
        }
    }

    pub async fn remove(&self, connection_id: &str) -> Result<Arc<SfuSession>> {
        self.sessions
            .write()
            .await
            .remove(connection_id)
            .ok_or_else(|| RelayError::NotFound(format!("session for connection {}", connection_id)))
    }

    pub async fn get(&self, connection_id: &str) -> Result<Arc<SfuSession>> {
        self.sessions
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(format!("session for connection {}", connection_id)))
    }

    pub async fn contains(&self, connection_id: &str) -> bool {
        self.sessions.read().await.contains_key(connection_id)
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_put_is_rejected() {
        let registry = ConnectionRegistry::new();
        registry.put("A", Arc::new(SfuSession::new("A"))).await.unwrap();

        let err = registry
            .put("A", Arc::new(SfuSession::new("A")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DuplicateConnection(id) if id == "A"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn remove_then_put_reuses_id() {
        let registry = ConnectionRegistry::new();
        let first = Arc::new(SfuSession::new("A"));
        registry.put("A", first.clone()).await.unwrap();

        let removed = registry.remove("A").await.unwrap();
        assert!(Arc::ptr_eq(&removed, &first));
        assert!(!registry.contains("A").await);
        assert!(matches!(registry.get("A").await, Err(RelayError::NotFound(_))));
        assert!(matches!(registry.remove("A").await, Err(RelayError::NotFound(_))));

        registry.put("A", Arc::new(SfuSession::new("A"))).await.unwrap();
        assert_eq!(registry.ids().await, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_puts_admit_one_session_per_id() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("conn-{}", i % 8);
                registry.put(&id, Arc::new(SfuSession::new(&id))).await.is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 8);
        assert_eq!(registry.len().await, 8);
    }
}
