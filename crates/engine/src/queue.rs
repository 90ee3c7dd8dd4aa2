//! Assignment engine
//!
//! Drains the unassigned queue one ticket per tick, routing the head of the
//! queue to the next eligible agent in round-robin order. Manual overrides
//! (take, reassign) share the same guarded store writes.

use std::sync::Arc;

use time::OffsetDateTime;

use deskflow_shared::{
    Agent, AgentId, DeskError, DeskResult, QueueConfig, SlaPolicy, SlaPolicyUpdate, TicketDetail,
    TicketId, TicketStatus, UserId,
};

use crate::notify::{Notifier, ServerEvent, Topic};
use crate::store::{load_detail, ClaimGuard, TicketStore};

/// Result of one assignment attempt
#[derive(Debug)]
pub enum AssignmentOutcome {
    /// The head of the queue went to an agent
    Assigned(Box<TicketDetail>),
    /// Queue is empty
    NoCandidate,
    /// Nobody is available and in shift
    NoEligibleAgent,
    /// Another path claimed the ticket between read and write
    Contended,
}

impl AssignmentOutcome {
    pub fn assigned(&self) -> Option<&TicketDetail> {
        match self {
            AssignmentOutcome::Assigned(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Cursor position after `last` in a set of `eligible` agents.
///
/// `eligible` must be non-zero. A negative stored cursor wraps like any other.
pub fn next_round_robin_index(last: i32, eligible: usize) -> usize {
    let len = eligible as i64;
    (i64::from(last) + 1).rem_euclid(len) as usize
}

#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
    sla_seed: SlaPolicy,
}

impl QueueService {
    /// `sla_seed` is only used if the queue configuration row does not exist yet
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

    /// Assign the head of the queue using the wall clock
    pub async fn assign_next_ticket(&self) -> DeskResult<AssignmentOutcome> {
        self.assign_next_ticket_at(OffsetDateTime::now_utc()).await
    }

    /// Assign the head of the queue, judging shift windows at `now`
    pub async fn assign_next_ticket_at(
        &self,
        now: OffsetDateTime,
    ) -> DeskResult<AssignmentOutcome> {
        let Some(ticket) = self.store.next_queued_ticket().await? else {
            tracing::debug!("No unassigned tickets in queue");
            return Ok(AssignmentOutcome::NoCandidate);
        };

        let eligible: Vec<Agent> = self
            .store
            .available_agents()
            .await?
            .into_iter()
            .filter(|agent| agent.is_in_shift(now))
            .collect();

        if eligible.is_empty() {
            tracing::debug!(ticket_id = %ticket.id, "No eligible agents for queued ticket");
            return Ok(AssignmentOutcome::NoEligibleAgent);
        }

        let config = self.store.queue_config_or_default(self.sla_seed).await?;
        let index = next_round_robin_index(config.last_assigned_agent_index, eligible.len());
        let agent = &eligible[index];

        let Some(claimed) = self
            .store
            .claim_ticket(ticket.id, agent.id, ClaimGuard::Queued)
            .await?
        else {
            tracing::debug!(ticket_id = %ticket.id, "Ticket claimed by another path first");
            return Ok(AssignmentOutcome::Contended);
        };

        // The ticket write stands on its own; cursor drift corrects itself next tick
        match self
            .store
            .advance_cursor(config.last_assigned_agent_index, index as i32)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                expected = config.last_assigned_agent_index,
                next = index,
                "Round-robin cursor moved concurrently; not advanced"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                ticket_id = %claimed.id,
                "Failed to persist round-robin cursor"
            ),
        }

        let detail = load_detail(self.store.as_ref(), claimed).await;
        self.notifier
            .publish(
                Topic::Agent(agent.user_id),
                ServerEvent::TicketAssigned {
                    ticket: detail.clone(),
                },
            )
            .await;
        self.notifier
            .publish(Topic::Agents, ServerEvent::QueueUpdated)
            .await;

        tracing::info!(
            ticket_id = %detail.ticket.id,
            agent_id = %agent.id,
            priority = detail.ticket.priority.as_str(),
            cursor = index,
            eligible_agents = eligible.len(),
            "Ticket assigned"
        );

        Ok(AssignmentOutcome::Assigned(Box::new(detail)))
    }

    /// Scheduled entry point; failures are logged and the tick is abandoned
    pub async fn run_assignment_tick(&self) {
        if let Err(e) = self.assign_next_ticket().await {
            tracing::error!(error = %e, "Assignment tick failed");
        }
    }

    /// An agent takes an unassigned ticket directly, bypassing round-robin
    pub async fn take_ticket(
        &self,
        ticket_id: TicketId,
        requesting_user: UserId,
    ) -> DeskResult<TicketDetail> {
        let ticket = self
            .store
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;

        if ticket.assigned_agent_id.is_some() {
            return Err(DeskError::AlreadyAssigned);
        }
        if ticket.status == TicketStatus::Resolved {
            return Err(DeskError::Validation(
                "Resolved ticket cannot be taken".to_string(),
            ));
        }

        let agent = self
            .store
            .agent_by_user(requesting_user)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Agent for user {}", requesting_user)))?;

        let claimed = self
            .store
            .claim_ticket(ticket_id, agent.id, ClaimGuard::Unassigned)
            .await?
            .ok_or(DeskError::AlreadyAssigned)?;

        let detail = load_detail(self.store.as_ref(), claimed).await;
        self.notifier
            .publish(
                Topic::Agent(agent.user_id),
                ServerEvent::TicketAssigned {
                    ticket: detail.clone(),
                },
            )
            .await;
        self.notifier
            .publish(Topic::Agents, ServerEvent::QueueUpdated)
            .await;

        tracing::info!(ticket_id = %ticket_id, agent_id = %agent.id, "Ticket taken by agent");
        Ok(detail)
    }

    /// Current queue configuration, created from the seed on first use
    pub async fn queue_config(&self) -> DeskResult<QueueConfig> {
        self.store.queue_config_or_default(self.sla_seed).await
    }

    /// Change the SLA windows applied to tickets created from now on.
    ///
    /// Existing tickets keep the deadlines they were stamped with.
    pub async fn update_sla_policy(&self, update: SlaPolicyUpdate) -> DeskResult<QueueConfig> {
        let current = self.store.queue_config_or_default(self.sla_seed).await?;
        let policy = update.apply(current.policy());
        policy.validate()?;

        let config = self
            .store
            .update_sla_policy(policy)
            .await?
            .ok_or_else(|| DeskError::NotFound("Queue configuration".to_string()))?;

        tracing::info!(
            response_hours = config.sla_response_hours,
            resolution_hours = config.sla_resolution_hours,
            "SLA policy updated"
        );
        Ok(config)
    }

    /// Administrative override: point a ticket at any agent
    pub async fn reassign_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
    ) -> DeskResult<TicketDetail> {
        if self.store.ticket(ticket_id).await?.is_none() {
            return Err(DeskError::NotFound(format!("Ticket {}", ticket_id)));
        }

        let agent = self
            .store
            .agent(agent_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Agent {}", agent_id)))?;

        let updated = self
            .store
            .reassign_ticket(ticket_id, agent.id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {}", ticket_id)))?;

        let detail = load_detail(self.store.as_ref(), updated).await;
        self.notifier
            .publish(
                Topic::Agent(agent.user_id),
                ServerEvent::TicketAssigned {
                    ticket: detail.clone(),
                },
            )
            .await;
        self.notifier
            .publish(Topic::Agents, ServerEvent::QueueUpdated)
            .await;
        self.notifier
            .publish(
                Topic::Admins,
                ServerEvent::TicketUpdated {
                    ticket: detail.clone(),
                },
            )
            .await;

        tracing::info!(ticket_id = %ticket_id, agent_id = %agent.id, "Ticket reassigned");
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_advances_by_one() {
        assert_eq!(next_round_robin_index(0, 3), 1);
        assert_eq!(next_round_robin_index(1, 3), 2);
        assert_eq!(next_round_robin_index(2, 3), 0);
    }

    #[test]
    fn test_round_robin_single_agent() {
        assert_eq!(next_round_robin_index(0, 1), 0);
        assert_eq!(next_round_robin_index(41, 1), 0);
    }

    #[test]
    fn test_round_robin_cursor_beyond_shrunk_set() {
        // Cursor from a larger set wraps onto the current one
        assert_eq!(next_round_robin_index(7, 2), 0);
        assert_eq!(next_round_robin_index(-1, 4), 0);
        assert_eq!(next_round_robin_index(-3, 4), 2);
    }
}
