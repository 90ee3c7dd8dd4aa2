//! Outbound event types and serialization
//!
//! Every event published by the engines, tagged with the name clients
//! subscribe to (`ticket-assigned`, `sla-breach`, ...).

use deskflow_shared::{AgentId, AgentStatus, TicketDetail, TicketId, TicketMessage, UserId};
use serde::Serialize;

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from the core to subscribers
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A ticket was routed to a specific agent
    TicketAssigned { ticket: TicketDetail },

    /// The unassigned queue changed; clients refetch
    QueueUpdated,

    /// Ticket status/priority/assignment changed
    TicketUpdated { ticket: TicketDetail },

    /// A ticket was auto-escalated after missing an SLA deadline
    SlaBreach { ticket: TicketDetail },

    /// A customer opened a ticket
    NewTicket { ticket: TicketDetail },

    /// Message added to a ticket
    NewMessage { message: TicketMessage },

    /// Agent availability changed
    AgentStatusChanged {
        agent_id: AgentId,
        user_id: UserId,
        status: AgentStatus,
    },
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::TicketAssigned { .. } => "ticket-assigned",
            Self::QueueUpdated => "queue-updated",
            Self::TicketUpdated { .. } => "ticket-updated",
            Self::SlaBreach { .. } => "sla-breach",
            Self::NewTicket { .. } => "new-ticket",
            Self::NewMessage { .. } => "new-message",
            Self::AgentStatusChanged { .. } => "agent-status-changed",
        }
    }

    /// Ticket the event is about, if any
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            Self::TicketAssigned { ticket }
            | Self::TicketUpdated { ticket }
            | Self::SlaBreach { ticket }
            | Self::NewTicket { ticket } => Some(ticket.ticket.id),
            Self::NewMessage { message } => Some(message.ticket_id),
            Self::QueueUpdated | Self::AgentStatusChanged { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_queue_updated_serialization() {
        let event = ServerEvent::QueueUpdated;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"queue-updated"}"#);
    }

    #[test]
    fn test_agent_status_changed_serialization() {
        let agent_id = AgentId(Uuid::nil());
        let user_id = UserId(Uuid::nil());
        let event = ServerEvent::AgentStatusChanged {
            agent_id,
            user_id,
            status: AgentStatus::Offline,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "agent-status-changed");
        assert_eq!(json["status"], "offline");
        assert_eq!(json["agent_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(event.name(), "agent-status-changed");
        assert!(event.ticket_id().is_none());
    }
}
