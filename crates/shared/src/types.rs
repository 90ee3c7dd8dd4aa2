//! Common types used across Deskflow

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{DeskError, DeskResult};

// =============================================================================
// ID Wrappers
// =============================================================================

/// Ticket ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TicketId(pub Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TicketId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Agent profile ID wrapper (distinct from the agent's user identity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AgentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// User ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Ticket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Assigned,
    InProgress,
    PendingCustomer,
    Resolved,
    Escalated,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::New
    }
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::PendingCustomer => "pending_customer",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
        }
    }

    /// Resolved and escalated tickets are never picked up by the SLA monitor again
    pub fn is_closed_for_monitoring(&self) -> bool {
        matches!(self, Self::Resolved | Self::Escalated)
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "pending_customer" => Ok(Self::PendingCustomer),
            "resolved" => Ok(Self::Resolved),
            "escalated" => Ok(Self::Escalated),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

/// Ticket priority, ordered for queue ranking (urgent > high > medium > low)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid ticket priority: {}", s)),
        }
    }
}

/// Agent availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Available,
    Busy,
    Away,
    Offline,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Offline
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "busy" => Ok(Self::Busy),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid agent status: {}", s)),
        }
    }
}

/// Platform role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Agent,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Customer
    }
}

/// Who wrote a ticket message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Customer,
    Agent,
}

// =============================================================================
// SLA Policy
// =============================================================================

pub const DEFAULT_SLA_RESPONSE_HOURS: i32 = 2;
pub const DEFAULT_SLA_RESOLUTION_HOURS: i32 = 24;
/// Longest window either clock may be configured with (one year)
pub const MAX_SLA_HOURS: i32 = 24 * 366;

/// Response/resolution windows applied to tickets at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub response_hours: i32,
    pub resolution_hours: i32,
}

/// Partial policy change; absent fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicyUpdate {
    #[serde(default)]
    pub response_hours: Option<i32>,
    #[serde(default)]
    pub resolution_hours: Option<i32>,
}

impl SlaPolicyUpdate {
    pub fn apply(&self, current: SlaPolicy) -> SlaPolicy {
        SlaPolicy {
            response_hours: self.response_hours.unwrap_or(current.response_hours),
            resolution_hours: self.resolution_hours.unwrap_or(current.resolution_hours),
        }
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            response_hours: DEFAULT_SLA_RESPONSE_HOURS,
            resolution_hours: DEFAULT_SLA_RESOLUTION_HOURS,
        }
    }
}

impl SlaPolicy {
    /// Both windows must be at least one hour and at most [`MAX_SLA_HOURS`]
    pub fn validate(&self) -> DeskResult<()> {
        for (name, hours) in [
            ("sla_response_hours", self.response_hours),
            ("sla_resolution_hours", self.resolution_hours),
        ] {
            if !(1..=MAX_SLA_HOURS).contains(&hours) {
                return Err(DeskError::Validation(format!(
                    "{} must be between 1 and {}",
                    name, MAX_SLA_HOURS
                )));
            }
        }
        Ok(())
    }

    /// Compute `(response_deadline, resolution_deadline)` for a ticket created at `created_at`
    pub fn deadlines(
        &self,
        created_at: OffsetDateTime,
    ) -> DeskResult<(OffsetDateTime, OffsetDateTime)> {
        let offset = |hours: i32| {
            created_at
                .checked_add(Duration::hours(i64::from(hours)))
                .ok_or_else(|| {
                    DeskError::Validation(format!("SLA window of {} hours is out of range", hours))
                })
        };
        Ok((offset(self.response_hours)?, offset(self.resolution_hours)?))
    }
}

// =============================================================================
// Models
// =============================================================================

/// User model (identity and auth live elsewhere; this is the read side the core needs)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Support ticket
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: TicketId,
    pub customer_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub subject: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub assigned_agent_id: Option<AgentId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_response_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub sla_response_deadline: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub sla_resolution_deadline: OffsetDateTime,
    pub escalation_reason: Option<String>,
}

impl Ticket {
    /// Waiting in the queue for the assignment engine
    pub fn is_queued(&self) -> bool {
        self.status == TicketStatus::New && self.assigned_agent_id.is_none()
    }

    /// No first response and the response deadline has passed
    pub fn response_breached(&self, now: OffsetDateTime) -> bool {
        self.first_response_at.is_none() && self.sla_response_deadline < now
    }

    /// Not resolved and the resolution deadline has passed
    pub fn resolution_breached(&self, now: OffsetDateTime) -> bool {
        self.resolved_at.is_none() && self.sla_resolution_deadline < now
    }
}

/// Agent profile
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: AgentId,
    pub user_id: UserId,
    pub status: AgentStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_shift_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_shift_end: Option<OffsetDateTime>,
    pub tickets_handled: i32,
    /// Running mean of resolution time in seconds
    pub avg_resolution_time: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Agent {
    /// An agent without a complete shift window is never restricted
    pub fn is_in_shift(&self, now: OffsetDateTime) -> bool {
        match (self.current_shift_start, self.current_shift_end) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => true,
        }
    }

    /// Available and inside (or unrestricted by) the shift window
    pub fn is_eligible(&self, now: OffsetDateTime) -> bool {
        self.status == AgentStatus::Available && self.is_in_shift(now)
    }
}

/// Online mean update: `(old * (n - 1) + sample) / n`, where `n` is the post-increment count.
///
/// Integer seconds, truncating like the stored column.
pub fn next_average_resolution(previous: Option<i64>, handled: i32, sample_secs: i64) -> i64 {
    match previous {
        Some(avg) if handled > 1 => {
            let n = i64::from(handled);
            (avg * (n - 1) + sample_secs) / n
        }
        _ => sample_secs,
    }
}

/// Singleton queue configuration row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueConfig {
    pub id: i32,
    pub last_assigned_agent_index: i32,
    pub sla_response_hours: i32,
    pub sla_resolution_hours: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl QueueConfig {
    /// Primary key of the one and only row
    pub const SINGLETON_ID: i32 = 1;

    /// Fresh config seeded from a policy, cursor at zero
    pub fn seeded(policy: SlaPolicy, now: OffsetDateTime) -> Self {
        Self {
            id: Self::SINGLETON_ID,
            last_assigned_agent_index: 0,
            sla_response_hours: policy.response_hours,
            sla_resolution_hours: policy.resolution_hours,
            updated_at: now,
        }
    }

    pub fn policy(&self) -> SlaPolicy {
        SlaPolicy {
            response_hours: self.sla_response_hours,
            resolution_hours: self.sla_resolution_hours,
        }
    }
}

/// Message posted on a ticket
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketMessage {
    pub id: Uuid,
    pub ticket_id: TicketId,
    pub sender_id: UserId,
    pub sender_type: SenderType,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Materialized views
// =============================================================================

/// Customer detail attached to a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Assigned agent detail attached to a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub status: AgentStatus,
}

impl AgentSummary {
    pub fn new(agent: &Agent, user: &User) -> Self {
        Self {
            id: agent.id,
            user_id: agent.user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            status: agent.status,
        }
    }
}

/// Ticket with its customer and assigned agent resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub customer: Option<UserSummary>,
    pub assigned_agent: Option<AgentSummary>,
}
