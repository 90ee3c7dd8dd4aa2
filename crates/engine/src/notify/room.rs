//! Topic room management for pub/sub
//!
//! Manages topic "rooms" (per agent, per role, per ticket) for broadcasting
//! events to all subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;
use super::Topic;

/// Manages topic "rooms" for broadcasting events
pub struct RoomManager {
    /// Map of topic -> list of connections
    rooms: Arc<RwLock<HashMap<Topic, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a room; joining twice is a no-op
    pub async fn join(&self, topic: Topic, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(topic).or_default();
        if members.iter().any(|c| c.session_id == conn.session_id) {
            return;
        }
        members.push(Arc::clone(&conn));

        tracing::debug!(
            topic = %topic,
            session_id = %conn.session_id,
            room_size = members.len(),
            "Connection joined room"
        );
    }

    /// Remove a connection from a room
    pub async fn leave(&self, topic: &Topic, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(conns) = rooms.get_mut(topic) {
            conns.retain(|c| c.session_id != *session_id);

            // Clean up empty rooms
            if conns.is_empty() {
                rooms.remove(topic);
                tracing::debug!(topic = %topic, "Removed empty room");
            } else {
                tracing::debug!(
                    topic = %topic,
                    session_id = %session_id,
                    room_size = conns.len(),
                    "Connection left room"
                );
            }
        }
    }

    /// Broadcast an event to all connections in a room
    ///
    /// Silently ignores send errors (closed connections will be cleaned up).
    /// Returns the number of connections the event reached.
    pub async fn broadcast(&self, topic: &Topic, event: ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(conns) = rooms.get(topic) else {
            tracing::debug!(
                topic = %topic,
                event_type = event.name(),
                "No subscribers for topic"
            );
            return 0;
        };

        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in conns {
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        session_id = %conn.session_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            topic = %topic,
            event_type = event.name(),
            recipients = success_count,
            failed = failed_count,
            "Broadcast event to room"
        );

        success_count
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        let mut removed_from = 0usize;

        for conns in rooms.values_mut() {
            let before_len = conns.len();
            conns.retain(|c| c.session_id != *session_id);
            if conns.len() < before_len {
                removed_from += 1;
            }
        }

        rooms.retain(|_, conns| !conns.is_empty());

        if removed_from > 0 {
            tracing::debug!(
                session_id = %session_id,
                room_count = removed_from,
                "Removed connection from rooms"
            );
        }
    }

    pub async fn get_room_size(&self, topic: &Topic) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(topic).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn get_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
