//! Subscriber connection management
//!
//! Represents an attached client with its role and topic subscriptions.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use deskflow_shared::{UserId, UserRole};

use super::events::ServerEvent;
use super::Topic;

/// Represents an attached subscriber
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: Uuid,

    /// Authenticated user ID
    pub user_id: UserId,

    /// Role the user connected with; decides the default rooms
    pub role: UserRole,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Topics this connection is subscribed to
    pub subscriptions: Arc<RwLock<HashSet<Topic>>>,
}

impl Connection {
    /// Create a new connection
    pub fn new(user_id: UserId, role: UserRole, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            role,
            sender,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Rooms every connection of this role joins on attach
    pub fn default_topics(&self) -> Vec<Topic> {
        let mut topics = vec![Topic::User(self.user_id)];
        match self.role {
            UserRole::Admin => topics.push(Topic::Admins),
            UserRole::Agent => {
                topics.push(Topic::Agents);
                topics.push(Topic::Agent(self.user_id));
            }
            UserRole::Customer => topics.push(Topic::Customer(self.user_id)),
        }
        topics
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    pub async fn subscribe(&self, topic: Topic) {
        let mut subs = self.subscriptions.write().await;
        subs.insert(topic);
        tracing::debug!(
            session_id = %self.session_id,
            topic = %topic,
            "Subscribed to topic"
        );
    }

    pub async fn unsubscribe(&self, topic: Topic) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(&topic);
        tracing::debug!(
            session_id = %self.session_id,
            topic = %topic,
            "Unsubscribed from topic"
        );
    }

    pub async fn is_subscribed(&self, topic: &Topic) -> bool {
        let subs = self.subscriptions.read().await;
        subs.contains(topic)
    }

    pub async fn get_subscriptions(&self) -> HashSet<Topic> {
        let subs = self.subscriptions.read().await;
        subs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskflow_shared::TicketId;

    #[tokio::test]
    async fn test_connection_subscription() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new(UserId::new(), UserRole::Customer, tx);
        let topic = Topic::Ticket(TicketId::new());

        assert!(!conn.is_subscribed(&topic).await);

        conn.subscribe(topic).await;
        assert!(conn.is_subscribed(&topic).await);

        conn.unsubscribe(topic).await;
        assert!(!conn.is_subscribed(&topic).await);
    }

    #[test]
    fn test_default_topics_by_role() {
        let user_id = UserId::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let agent = Connection::new(user_id, UserRole::Agent, tx.clone());
        assert_eq!(
            agent.default_topics(),
            vec![Topic::User(user_id), Topic::Agents, Topic::Agent(user_id)]
        );

        let admin = Connection::new(user_id, UserRole::Admin, tx.clone());
        assert_eq!(admin.default_topics(), vec![Topic::User(user_id), Topic::Admins]);

        let customer = Connection::new(user_id, UserRole::Customer, tx);
        assert_eq!(
            customer.default_topics(),
            vec![Topic::User(user_id), Topic::Customer(user_id)]
        );
    }
}
