//! Notification sink for ticket and queue events
//!
//! The engines publish through the [`Notifier`] trait; delivery is
//! fire-and-forget and never fails the state transition that caused it.
//!
//! # Architecture
//!
//! - **Topic**: address of a subscriber group (one agent, a role, a ticket)
//! - **Connection**: an attached subscriber with its role and subscriptions
//! - **Room**: topic-based pub/sub for broadcasting events
//! - **Hub**: in-process registry implementing [`Notifier`]
//! - **Events**: type-safe event definitions

pub mod connection;
pub mod events;
pub mod hub;
pub mod room;

use std::fmt;

use deskflow_shared::{TicketId, UserId};

pub use events::ServerEvent;
pub use hub::NotificationHub;

/// Subscriber group an event is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Private channel of one agent, keyed by the agent's user id
    Agent(UserId),
    /// Every connected agent
    Agents,
    /// Every connected admin
    Admins,
    /// Private channel of one customer
    Customer(UserId),
    /// Any connection of one user
    User(UserId),
    /// Everyone watching one ticket
    Ticket(TicketId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Agent(id) => write!(f, "agent-{}", id),
            Topic::Agents => f.write_str("agents-room"),
            Topic::Admins => f.write_str("admin-room"),
            Topic::Customer(id) => write!(f, "customer-{}", id),
            Topic::User(id) => write!(f, "user-{}", id),
            Topic::Ticket(id) => write!(f, "ticket-{}", id),
        }
    }
}

/// Publish-capable channel to topic-scoped subscriber groups
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event` to every subscriber of `topic`; failures are logged, never returned
    async fn publish(&self, topic: Topic, event: ServerEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_topic_names() {
        let id = Uuid::nil();
        assert_eq!(
            Topic::Agent(UserId(id)).to_string(),
            "agent-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(Topic::Agents.to_string(), "agents-room");
        assert_eq!(Topic::Admins.to_string(), "admin-room");
        assert_eq!(
            Topic::Ticket(TicketId(id)).to_string(),
            "ticket-00000000-0000-0000-0000-000000000000"
        );
    }
}
