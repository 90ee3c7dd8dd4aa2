//! Ticket/agent storage contract
//!
//! Every mutation both engines and the request handlers perform goes through
//! a guarded, single-step update here. The store is the only consistency
//! boundary shared by the scheduled ticks and externally triggered operations,
//! so callers never lock in-process.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use time::OffsetDateTime;

use deskflow_shared::{
    Agent, AgentId, AgentStatus, BreachKind, DeskResult, QueueConfig, SlaPolicy, Ticket,
    TicketCounts, TicketDetail, TicketId, TicketMessage, TicketPriority, TicketStatus, User,
    UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Precondition a claim must still satisfy when it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimGuard {
    /// Still `new` and unassigned (round-robin assignment)
    Queued,
    /// Unassigned and not resolved (agent taking a ticket)
    Unassigned,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Point reads
    // -------------------------------------------------------------------------

    async fn ticket(&self, id: TicketId) -> DeskResult<Option<Ticket>>;

    /// Ticket with customer and assigned-agent summaries resolved
    async fn ticket_detail(&self, id: TicketId) -> DeskResult<Option<TicketDetail>>;

    async fn agent(&self, id: AgentId) -> DeskResult<Option<Agent>>;

    async fn agent_by_user(&self, user_id: UserId) -> DeskResult<Option<Agent>>;

    async fn user(&self, id: UserId) -> DeskResult<Option<User>>;

    // -------------------------------------------------------------------------
    // Range queries
    // -------------------------------------------------------------------------

    /// Head of the queue: `new`, unassigned, priority DESC then created_at ASC
    async fn next_queued_ticket(&self) -> DeskResult<Option<Ticket>>;

    /// The whole queue in assignment order
    async fn queued_tickets(&self) -> DeskResult<Vec<Ticket>>;

    /// Agents with status `available`, oldest profile first
    ///
    /// Shift filtering is left to the caller so one clock decides eligibility.
    async fn available_agents(&self) -> DeskResult<Vec<Agent>>;

    /// Non-resolved tickets assigned to an agent
    async fn open_tickets_for_agent(&self, agent_id: AgentId) -> DeskResult<Vec<Ticket>>;

    /// Open tickets with at least one blown deadline at `now`
    async fn breach_candidates(&self, now: OffsetDateTime) -> DeskResult<Vec<Ticket>>;

    async fn ticket_messages(&self, ticket_id: TicketId) -> DeskResult<Vec<TicketMessage>>;

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    /// Every agent profile, oldest first
    async fn agents(&self) -> DeskResult<Vec<Agent>>;

    /// Tickets ever assigned to an agent, newest first, optionally bounded by
    /// creation time (both ends inclusive)
    async fn tickets_for_agent(
        &self,
        agent_id: AgentId,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> DeskResult<Vec<Ticket>>;

    /// Tickets created at or after `since`
    async fn tickets_created_since(&self, since: OffsetDateTime) -> DeskResult<Vec<Ticket>>;

    /// Open and queued totals
    async fn ticket_counts(&self) -> DeskResult<TicketCounts>;

    // -------------------------------------------------------------------------
    // Guarded updates
    // -------------------------------------------------------------------------

    /// Set the agent and move to `assigned` only while `guard` holds.
    ///
    /// Returns `None` when the ticket is missing or the guard no longer holds.
    async fn claim_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
        guard: ClaimGuard,
    ) -> DeskResult<Option<Ticket>>;

    /// Unconditional agent write; a `new` ticket is promoted to `assigned`
    async fn reassign_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
    ) -> DeskResult<Option<Ticket>>;

    /// Escalate with `kind`'s reason while the ticket is open and its breach
    /// state at `now` is still exactly `kind`.
    ///
    /// Returns `None` when another path closed the ticket or changed which
    /// deadlines are blown (a first response landing, for instance).
    async fn escalate_if_breached(
        &self,
        ticket_id: TicketId,
        kind: BreachKind,
        now: OffsetDateTime,
    ) -> DeskResult<Option<Ticket>>;

    /// Returns whether this call set the timestamp
    async fn set_first_response_if_absent(
        &self,
        ticket_id: TicketId,
        at: OffsetDateTime,
    ) -> DeskResult<bool>;

    /// Returns the ticket only when this call set `resolved_at`
    async fn set_resolved_if_absent(
        &self,
        ticket_id: TicketId,
        at: OffsetDateTime,
    ) -> DeskResult<Option<Ticket>>;

    /// Write a status (and optionally a reason), refusing `new` on an assigned ticket
    async fn set_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
        escalation_reason: Option<&str>,
    ) -> DeskResult<Option<Ticket>>;

    /// Compare-and-set on the status field
    async fn transition_status(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
    ) -> DeskResult<bool>;

    async fn set_priority(
        &self,
        ticket_id: TicketId,
        priority: TicketPriority,
    ) -> DeskResult<Option<Ticket>>;

    async fn set_agent_status(
        &self,
        agent_id: AgentId,
        status: AgentStatus,
    ) -> DeskResult<Option<Agent>>;

    /// Increment `tickets_handled` and fold `resolution_secs` into the running mean
    async fn record_resolution(
        &self,
        agent_id: AgentId,
        resolution_secs: i64,
    ) -> DeskResult<Option<Agent>>;

    // -------------------------------------------------------------------------
    // Queue configuration
    // -------------------------------------------------------------------------

    /// Load the singleton row, creating it from `seed` on first use
    async fn queue_config_or_default(&self, seed: SlaPolicy) -> DeskResult<QueueConfig>;

    /// Overwrite the SLA hours, leaving the cursor alone.
    ///
    /// Returns `None` when the row has not been created yet.
    async fn update_sla_policy(&self, policy: SlaPolicy) -> DeskResult<Option<QueueConfig>>;

    /// Compare-and-set on the round-robin cursor
    async fn advance_cursor(&self, expected: i32, next: i32) -> DeskResult<bool>;

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    async fn insert_user(&self, user: &User) -> DeskResult<()>;

    async fn insert_agent(&self, agent: &Agent) -> DeskResult<()>;

    async fn insert_ticket(&self, ticket: &Ticket) -> DeskResult<()>;

    async fn insert_message(&self, message: &TicketMessage) -> DeskResult<()>;
}

/// Resolve customer/agent detail for a ticket that was just written.
///
/// The write already happened, so a failed lookup degrades to the bare ticket.
pub(crate) async fn load_detail(store: &dyn TicketStore, ticket: Ticket) -> TicketDetail {
    match store.ticket_detail(ticket.id).await {
        Ok(Some(detail)) => detail,
        Ok(None) => bare_detail(ticket),
        Err(e) => {
            tracing::warn!(error = %e, ticket_id = %ticket.id, "Failed to load ticket detail");
            bare_detail(ticket)
        }
    }
}

fn bare_detail(ticket: Ticket) -> TicketDetail {
    TicketDetail {
        ticket,
        customer: None,
        assigned_agent: None,
    }
}
