//! In-process notification hub
//!
//! Tracks attached connections and their rooms, and implements [`Notifier`]
//! so the engines can publish without knowing who is listening.
//!
//! The hub owns no transport. A websocket or push layer attaches each client
//! with [`NotificationHub::connect`] and forwards what the returned receiver
//! yields; events for rooms nobody has joined are dropped.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use deskflow_shared::{TicketId, UserId, UserRole};

use super::connection::Connection;
use super::events::ServerEvent;
use super::room::RoomManager;
use super::{Notifier, Topic};

/// Connection registry plus topic rooms, shared by every publisher
#[derive(Clone)]
pub struct NotificationHub {
    /// All active connections indexed by session_id
    pub connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Room manager for topic subscriptions
    pub rooms: Arc<RoomManager>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RoomManager::new()),
        }
    }

    /// Attach a subscriber and join the rooms its role implies
    ///
    /// The returned receiver yields every event published to those rooms.
    pub async fn connect(
        &self,
        user_id: UserId,
        role: UserRole,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new(user_id, role, tx));

        {
            let mut connections = self.connections.write().await;
            connections.insert(conn.session_id, Arc::clone(&conn));

            tracing::info!(
                session_id = %conn.session_id,
                user_id = %conn.user_id,
                role = ?conn.role,
                total_connections = connections.len(),
                "Subscriber connected"
            );
        }

        for topic in conn.default_topics() {
            self.join(&conn, topic).await;
        }

        (conn, rx)
    }

    /// Detach a subscriber and drop it from every room
    pub async fn disconnect(&self, session_id: &Uuid) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write().await;
        let conn = connections.remove(session_id)?;
        self.rooms.remove_connection(session_id).await;

        tracing::info!(
            session_id = %session_id,
            user_id = %conn.user_id,
            remaining_connections = connections.len(),
            "Subscriber disconnected"
        );

        Some(conn)
    }

    /// Follow real-time updates for one ticket
    pub async fn join_ticket(&self, session_id: &Uuid, ticket_id: TicketId) -> bool {
        let Some(conn) = self.get_connection(session_id).await else {
            return false;
        };
        self.join(&conn, Topic::Ticket(ticket_id)).await;
        true
    }

    /// Stop following a ticket
    pub async fn leave_ticket(&self, session_id: &Uuid, ticket_id: TicketId) {
        let topic = Topic::Ticket(ticket_id);
        if let Some(conn) = self.get_connection(session_id).await {
            conn.unsubscribe(topic).await;
        }
        self.rooms.leave(&topic, session_id).await;
    }

    async fn join(&self, conn: &Arc<Connection>, topic: Topic) {
        conn.subscribe(topic).await;
        self.rooms.join(topic, Arc::clone(conn)).await;
    }

    pub async fn get_connection(&self, session_id: &Uuid) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(session_id).cloned()
    }

    /// All live connections of one user (several tabs/devices)
    pub async fn get_user_connections(&self, user_id: &UserId) -> Vec<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn get_stats(&self) -> HubStats {
        HubStats {
            active_connections: self.connection_count().await,
            active_rooms: self.rooms.get_room_count().await,
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Notifier for NotificationHub {
    async fn publish(&self, topic: Topic, event: ServerEvent) {
        self.rooms.broadcast(&topic, event).await;
    }
}

/// Statistics about attached subscribers
#[derive(Debug, Clone)]
pub struct HubStats {
    pub active_connections: usize,
    pub active_rooms: usize,
}
