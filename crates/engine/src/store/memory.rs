//! In-memory store
//!
//! Holds the whole dataset behind one `RwLock`; every guarded update keeps the
//! write lock for its full compare-and-set. Used by tests and local demos, with
//! switches to simulate an unreachable database and a failing cursor write.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use deskflow_shared::{
    breach_kind, next_average_resolution, Agent, AgentId, AgentStatus, AgentSummary, BreachKind,
    DeskError, DeskResult, QueueConfig, SlaPolicy, Ticket, TicketCounts, TicketDetail, TicketId,
    TicketMessage, TicketPriority, TicketStatus, User, UserId, UserSummary,
};

use super::{ClaimGuard, TicketStore};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    agents: HashMap<AgentId, Agent>,
    tickets: HashMap<TicketId, Ticket>,
    messages: Vec<TicketMessage>,
    queue_config: Option<QueueConfig>,
}

impl State {
    fn detail(&self, ticket: &Ticket) -> TicketDetail {
        let customer = self.users.get(&ticket.customer_id).map(|u| UserSummary {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        });
        let assigned_agent = ticket
            .assigned_agent_id
            .and_then(|id| self.agents.get(&id))
            .and_then(|agent| {
                self.users
                    .get(&agent.user_id)
                    .map(|u| AgentSummary::new(agent, u))
            });

        TicketDetail {
            ticket: ticket.clone(),
            customer,
            assigned_agent,
        }
    }

    fn queue(&self) -> Vec<Ticket> {
        let mut queue: Vec<Ticket> = self
            .tickets
            .values()
            .filter(|t| t.is_queued())
            .cloned()
            .collect();
        queue.sort_by_key(|t| (Reverse(t.priority), t.created_at, t.id.0));
        queue
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    offline: AtomicBool,
    reject_cursor_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with a store error until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `advance_cursor` fail while ticket writes keep succeeding
    pub fn reject_cursor_writes(&self, reject: bool) {
        self.reject_cursor_writes.store(reject, Ordering::SeqCst);
    }

    /// Replace the queue configuration row
    pub async fn put_queue_config(&self, config: QueueConfig) {
        self.state.write().await.queue_config = Some(config);
    }

    /// Current queue configuration row, if it has been created
    pub async fn queue_config(&self) -> Option<QueueConfig> {
        self.state.read().await.queue_config.clone()
    }

    /// Snapshot of every ticket, for assertions
    pub async fn all_tickets(&self) -> Vec<Ticket> {
        self.state.read().await.tickets.values().cloned().collect()
    }

    fn check(&self) -> DeskResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DeskError::Store("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn ticket(&self, id: TicketId) -> DeskResult<Option<Ticket>> {
        self.check()?;
        Ok(self.state.read().await.tickets.get(&id).cloned())
    }

    async fn ticket_detail(&self, id: TicketId) -> DeskResult<Option<TicketDetail>> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state.tickets.get(&id).map(|t| state.detail(t)))
    }

    async fn agent(&self, id: AgentId) -> DeskResult<Option<Agent>> {
        self.check()?;
        Ok(self.state.read().await.agents.get(&id).cloned())
    }

    async fn agent_by_user(&self, user_id: UserId) -> DeskResult<Option<Agent>> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state
            .agents
            .values()
            .find(|a| a.user_id == user_id)
            .cloned())
    }

    async fn user(&self, id: UserId) -> DeskResult<Option<User>> {
        self.check()?;
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn next_queued_ticket(&self) -> DeskResult<Option<Ticket>> {
        self.check()?;
        Ok(self.state.read().await.queue().into_iter().next())
    }

    async fn queued_tickets(&self) -> DeskResult<Vec<Ticket>> {
        self.check()?;
        Ok(self.state.read().await.queue())
    }

    async fn available_agents(&self) -> DeskResult<Vec<Agent>> {
        self.check()?;
        let state = self.state.read().await;
        let mut agents: Vec<Agent> = state
            .agents
            .values()
            .filter(|a| a.status == AgentStatus::Available)
            .cloned()
            .collect();
        agents.sort_by_key(|a| (a.created_at, a.id.0));
        Ok(agents)
    }

    async fn open_tickets_for_agent(&self, agent_id: AgentId) -> DeskResult<Vec<Ticket>> {
        self.check()?;
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.assigned_agent_id == Some(agent_id) && t.status != TicketStatus::Resolved)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id.0));
        Ok(tickets)
    }

    async fn breach_candidates(&self, now: OffsetDateTime) -> DeskResult<Vec<Ticket>> {
        self.check()?;
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| {
                !t.status.is_closed_for_monitoring()
                    && (t.response_breached(now) || t.resolution_breached(now))
            })
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id.0));
        Ok(tickets)
    }

    async fn ticket_messages(&self, ticket_id: TicketId) -> DeskResult<Vec<TicketMessage>> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn agents(&self) -> DeskResult<Vec<Agent>> {
        self.check()?;
        let state = self.state.read().await;
        let mut agents: Vec<Agent> = state.agents.values().cloned().collect();
        agents.sort_by_key(|a| (a.created_at, a.id.0));
        Ok(agents)
    }

    async fn tickets_for_agent(
        &self,
        agent_id: AgentId,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> DeskResult<Vec<Ticket>> {
        self.check()?;
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.assigned_agent_id == Some(agent_id))
            .filter(|t| from.map_or(true, |from| t.created_at >= from))
            .filter(|t| to.map_or(true, |to| t.created_at <= to))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (Reverse(t.created_at), t.id.0));
        Ok(tickets)
    }

    async fn tickets_created_since(&self, since: OffsetDateTime) -> DeskResult<Vec<Ticket>> {
        self.check()?;
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.created_at >= since)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id.0));
        Ok(tickets)
    }

    async fn ticket_counts(&self) -> DeskResult<TicketCounts> {
        self.check()?;
        let state = self.state.read().await;
        let mut counts = TicketCounts::default();
        for ticket in state.tickets.values() {
            if ticket.status != TicketStatus::Resolved {
                counts.active += 1;
            }
            if ticket.is_queued() {
                counts.queued += 1;
            }
        }
        Ok(counts)
    }

    async fn claim_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
        guard: ClaimGuard,
    ) -> DeskResult<Option<Ticket>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };

        let holds = match guard {
            ClaimGuard::Queued => ticket.is_queued(),
            ClaimGuard::Unassigned => {
                ticket.assigned_agent_id.is_none() && ticket.status != TicketStatus::Resolved
            }
        };
        if !holds {
            return Ok(None);
        }

        ticket.assigned_agent_id = Some(agent_id);
        ticket.status = TicketStatus::Assigned;
        ticket.updated_at = OffsetDateTime::now_utc();
        Ok(Some(ticket.clone()))
    }

    async fn reassign_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
    ) -> DeskResult<Option<Ticket>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };

        ticket.assigned_agent_id = Some(agent_id);
        if ticket.status == TicketStatus::New {
            ticket.status = TicketStatus::Assigned;
        }
        ticket.updated_at = OffsetDateTime::now_utc();
        Ok(Some(ticket.clone()))
    }

    async fn escalate_if_breached(
        &self,
        ticket_id: TicketId,
        kind: BreachKind,
        now: OffsetDateTime,
    ) -> DeskResult<Option<Ticket>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        if ticket.status.is_closed_for_monitoring() || breach_kind(ticket, now) != Some(kind) {
            return Ok(None);
        }

        ticket.status = TicketStatus::Escalated;
        ticket.escalation_reason = Some(kind.reason().to_string());
        ticket.updated_at = OffsetDateTime::now_utc();
        Ok(Some(ticket.clone()))
    }

    async fn set_first_response_if_absent(
        &self,
        ticket_id: TicketId,
        at: OffsetDateTime,
    ) -> DeskResult<bool> {
        self.check()?;
        let mut state = self.state.write().await;
        match state.tickets.get_mut(&ticket_id) {
            Some(ticket) if ticket.first_response_at.is_none() => {
                ticket.first_response_at = Some(at);
                ticket.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_resolved_if_absent(
        &self,
        ticket_id: TicketId,
        at: OffsetDateTime,
    ) -> DeskResult<Option<Ticket>> {
        self.check()?;
        let mut state = self.state.write().await;
        match state.tickets.get_mut(&ticket_id) {
            Some(ticket) if ticket.resolved_at.is_none() => {
                ticket.resolved_at = Some(at);
                ticket.updated_at = OffsetDateTime::now_utc();
                Ok(Some(ticket.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
        escalation_reason: Option<&str>,
    ) -> DeskResult<Option<Ticket>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        if status == TicketStatus::New && ticket.assigned_agent_id.is_some() {
            return Ok(None);
        }

        ticket.status = status;
        if let Some(reason) = escalation_reason {
            ticket.escalation_reason = Some(reason.to_string());
        }
        ticket.updated_at = OffsetDateTime::now_utc();
        Ok(Some(ticket.clone()))
    }

    async fn transition_status(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
    ) -> DeskResult<bool> {
        self.check()?;
        let mut state = self.state.write().await;
        match state.tickets.get_mut(&ticket_id) {
            Some(ticket) if ticket.status == from => {
                ticket.status = to;
                ticket.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_priority(
        &self,
        ticket_id: TicketId,
        priority: TicketPriority,
    ) -> DeskResult<Option<Ticket>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        ticket.priority = priority;
        ticket.updated_at = OffsetDateTime::now_utc();
        Ok(Some(ticket.clone()))
    }

    async fn set_agent_status(
        &self,
        agent_id: AgentId,
        status: AgentStatus,
    ) -> DeskResult<Option<Agent>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(agent) = state.agents.get_mut(&agent_id) else {
            return Ok(None);
        };
        agent.status = status;
        Ok(Some(agent.clone()))
    }

    async fn record_resolution(
        &self,
        agent_id: AgentId,
        resolution_secs: i64,
    ) -> DeskResult<Option<Agent>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(agent) = state.agents.get_mut(&agent_id) else {
            return Ok(None);
        };
        agent.tickets_handled += 1;
        agent.avg_resolution_time = Some(next_average_resolution(
            agent.avg_resolution_time,
            agent.tickets_handled,
            resolution_secs,
        ));
        Ok(Some(agent.clone()))
    }

    async fn queue_config_or_default(&self, seed: SlaPolicy) -> DeskResult<QueueConfig> {
        self.check()?;
        let mut state = self.state.write().await;
        let config = state
            .queue_config
            .get_or_insert_with(|| QueueConfig::seeded(seed, OffsetDateTime::now_utc()));
        Ok(config.clone())
    }

    async fn update_sla_policy(&self, policy: SlaPolicy) -> DeskResult<Option<QueueConfig>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(config) = state.queue_config.as_mut() else {
            return Ok(None);
        };
        config.sla_response_hours = policy.response_hours;
        config.sla_resolution_hours = policy.resolution_hours;
        config.updated_at = OffsetDateTime::now_utc();
        Ok(Some(config.clone()))
    }

    async fn advance_cursor(&self, expected: i32, next: i32) -> DeskResult<bool> {
        self.check()?;
        if self.reject_cursor_writes.load(Ordering::SeqCst) {
            return Err(DeskError::Store("queue_config write rejected".to_string()));
        }

        let mut state = self.state.write().await;
        match state.queue_config.as_mut() {
            Some(config) if config.last_assigned_agent_index == expected => {
                config.last_assigned_agent_index = next;
                config.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_user(&self, user: &User) -> DeskResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(DeskError::Validation(format!(
                "Email already registered: {}",
                user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_agent(&self, agent: &Agent) -> DeskResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        if !state.users.contains_key(&agent.user_id) {
            return Err(DeskError::NotFound(format!("user {}", agent.user_id)));
        }
        state.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> DeskResult<()> {
        self.check()?;
        if ticket.assigned_agent_id.is_some() && ticket.status == TicketStatus::New {
            return Err(DeskError::Validation(
                "Assigned ticket cannot have status new".to_string(),
            ));
        }
        let mut state = self.state.write().await;
        state.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn insert_message(&self, message: &TicketMessage) -> DeskResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        if !state.tickets.contains_key(&message.ticket_id) {
            return Err(DeskError::NotFound(format!("ticket {}", message.ticket_id)));
        }
        state.messages.push(message.clone());
        Ok(())
    }
}
