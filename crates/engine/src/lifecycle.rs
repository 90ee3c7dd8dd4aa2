//! Ticket lifecycle operations
//!
//! Creation, status/priority updates and messages. These share the one-time
//! timestamp and resolution bookkeeping the engines depend on, so every write
//! goes through the store's guarded setters.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use deskflow_shared::{
    sla_status, DeskError, DeskResult, SenderType, SlaPolicy, SlaStatus, Ticket, TicketDetail,
    TicketId, TicketMessage, TicketPriority, TicketStatus, UserId, UserRole,
};

use crate::notify::{Notifier, ServerEvent, Topic};
use crate::store::{load_detail, TicketStore};

/// Request to open a ticket
#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub customer_id: UserId,
    pub subject: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
}

/// Fields an agent or admin may change; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    /// Stored only together with a move to `escalated`
    pub escalation_reason: Option<String>,
}

/// Queue as an agent sees it
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    /// Unassigned tickets in assignment order
    pub queue: Vec<Ticket>,
    /// The requesting agent's tickets that are not resolved yet
    pub my_tickets: Vec<Ticket>,
}

#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
    sla_seed: SlaPolicy,
}

impl TicketService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        notifier: Arc<dyn Notifier>,
        sla_seed: SlaPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            sla_seed,
        }
    }

    /// Open a ticket with deadlines fixed from the current queue policy
    pub async fn create_ticket(
        &self,
        request: NewTicket,
        now: OffsetDateTime,
    ) -> DeskResult<TicketDetail> {
        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(DeskError::Validation("Subject is required".to_string()));
        }

        let customer = self
            .store
            .user(request.customer_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("User {}", request.customer_id)))?;

        let config = self.store.queue_config_or_default(self.sla_seed).await?;
        let (response_deadline, resolution_deadline) = config.policy().deadlines(now)?;

        let ticket = Ticket {
            id: TicketId::new(),
            customer_id: customer.id,
            customer_name: customer.name,
            customer_email: customer.email,
            subject: subject.to_string(),
            description: request.description,
            category: request.category,
            status: TicketStatus::New,
            priority: request.priority.unwrap_or_default(),
            assigned_agent_id: None,
            created_at: now,
            updated_at: now,
            first_response_at: None,
            resolved_at: None,
            sla_response_deadline: response_deadline,
            sla_resolution_deadline: resolution_deadline,
            escalation_reason: None,
        };
        self.store.insert_ticket(&ticket).await?;

        let detail = load_detail(self.store.as_ref(), ticket).await;
        for topic in [Topic::Agents, Topic::Admins] {
            self.notifier
                .publish(
                    topic,
                    ServerEvent::NewTicket {
                        ticket: detail.clone(),
                    },
                )
                .await;
        }

        tracing::info!(
            ticket_id = %detail.ticket.id,
            customer_id = %detail.ticket.customer_id,
            priority = detail.ticket.priority.as_str(),
            "Ticket created"
        );
        Ok(detail)
    }

    /// Apply a status and/or priority change
    pub async fn update_ticket(
        &self,
        ticket_id: TicketId,
        update: TicketUpdate,
        now: OffsetDateTime,
    ) -> DeskResult<TicketDetail> {
        let ticket = self
            .store
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;

        if let Some(status) = update.status {
            self.apply_status(&ticket, status, update.escalation_reason.as_deref(), now)
                .await?;
        }

        if let Some(priority) = update.priority {
            self.store
                .set_priority(ticket_id, priority)
                .await?
                .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;
        }

        let current = self
            .store
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;
        let detail = load_detail(self.store.as_ref(), current).await;

        for topic in [
            Topic::Customer(detail.ticket.customer_id),
            Topic::Agents,
            Topic::Admins,
        ] {
            self.notifier
                .publish(
                    topic,
                    ServerEvent::TicketUpdated {
                        ticket: detail.clone(),
                    },
                )
                .await;
        }

        tracing::info!(
            ticket_id = %ticket_id,
            status = detail.ticket.status.as_str(),
            priority = detail.ticket.priority.as_str(),
            "Ticket updated"
        );
        Ok(detail)
    }

    async fn apply_status(
        &self,
        ticket: &Ticket,
        status: TicketStatus,
        escalation_reason: Option<&str>,
        now: OffsetDateTime,
    ) -> DeskResult<()> {
        if status == TicketStatus::New {
            if ticket.status == TicketStatus::Resolved {
                return Err(DeskError::Validation(
                    "Resolved ticket cannot be reopened as new".to_string(),
                ));
            }
            if ticket.assigned_agent_id.is_some() {
                return Err(DeskError::Validation(
                    "Assigned ticket cannot return to new".to_string(),
                ));
            }
        }

        let reason = match status {
            TicketStatus::Escalated => escalation_reason,
            _ => None,
        };
        self.store
            .set_status(ticket.id, status, reason)
            .await?
            .ok_or_else(|| {
                DeskError::Validation("Ticket was assigned before the update applied".to_string())
            })?;

        match status {
            TicketStatus::InProgress => {
                self.store
                    .set_first_response_if_absent(ticket.id, now)
                    .await?;
            }
            TicketStatus::Resolved => {
                // Only the call that wins the resolved_at guard updates agent stats
                if let Some(resolved) = self.store.set_resolved_if_absent(ticket.id, now).await? {
                    if let Some(agent_id) = resolved.assigned_agent_id {
                        let secs = (now - resolved.created_at).whole_seconds().max(0);
                        let agent = self.store.record_resolution(agent_id, secs).await?;
                        if agent.is_none() {
                            tracing::warn!(
                                ticket_id = %ticket.id,
                                agent_id = %agent_id,
                                "Assigned agent missing; resolution not recorded"
                            );
                        }
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Add a message; an agent's first reply starts the work on the ticket
    pub async fn post_message(
        &self,
        ticket_id: TicketId,
        sender_id: UserId,
        body: &str,
        now: OffsetDateTime,
    ) -> DeskResult<TicketMessage> {
        let body = body.trim();
        if body.is_empty() {
            return Err(DeskError::Validation("Message is required".to_string()));
        }

        let ticket = self
            .store
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;
        let sender = self
            .store
            .user(sender_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("User {}", sender_id)))?;

        let sender_type = match sender.role {
            UserRole::Customer => SenderType::Customer,
            UserRole::Agent | UserRole::Admin => SenderType::Agent,
        };

        let message = TicketMessage {
            id: Uuid::new_v4(),
            ticket_id,
            sender_id,
            sender_type,
            body: body.to_string(),
            created_at: now,
        };
        self.store.insert_message(&message).await?;

        if sender_type == SenderType::Agent
            && self
                .store
                .set_first_response_if_absent(ticket_id, now)
                .await?
        {
            self.store
                .transition_status(ticket_id, TicketStatus::Assigned, TicketStatus::InProgress)
                .await?;
            tracing::info!(ticket_id = %ticket_id, "First response recorded");
        }

        let event = ServerEvent::NewMessage {
            message: message.clone(),
        };
        self.notifier
            .publish(Topic::Ticket(ticket_id), event.clone())
            .await;
        self.notifier
            .publish(Topic::Customer(ticket.customer_id), event.clone())
            .await;
        if let Some(agent_id) = ticket.assigned_agent_id {
            match self.store.agent(agent_id).await {
                Ok(Some(agent)) => {
                    self.notifier
                        .publish(Topic::Agent(agent.user_id), event)
                        .await;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    error = %e,
                    ticket_id = %ticket_id,
                    "Failed to look up assigned agent for message notification"
                ),
            }
        }

        Ok(message)
    }

    pub async fn messages(&self, ticket_id: TicketId) -> DeskResult<Vec<TicketMessage>> {
        self.store.ticket_messages(ticket_id).await
    }

    /// Unassigned queue plus the caller's own open tickets
    pub async fn queue_snapshot(&self, user_id: UserId) -> DeskResult<QueueSnapshot> {
        let queue = self.store.queued_tickets().await?;
        let my_tickets = match self.store.agent_by_user(user_id).await? {
            Some(agent) => self.store.open_tickets_for_agent(agent.id).await?,
            None => Vec::new(),
        };

        Ok(QueueSnapshot { queue, my_tickets })
    }

    /// Traffic-light state of both SLA clocks
    pub async fn sla_status(
        &self,
        ticket_id: TicketId,
        now: OffsetDateTime,
    ) -> DeskResult<SlaStatus> {
        let ticket = self
            .store
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;
        Ok(sla_status(&ticket, now))
    }
}
