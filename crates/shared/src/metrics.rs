//! Agent performance and live queue metrics
//!
//! Pure aggregation over rows the store has already loaded. Rates are
//! percentages rounded to two decimals; averages are whole seconds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, Time};

use crate::types::{Agent, AgentStatus, AgentSummary, Ticket, TicketStatus};

/// Ticket totals the store counts without loading rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounts {
    /// Anything not resolved
    pub active: i64,
    /// `new` and unassigned
    pub queued: i64,
}

/// How one agent's tickets fared against their SLA
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    pub agent: AgentSummary,
    pub tickets_handled: i32,
    pub avg_resolution_time: Option<i64>,
    pub total_tickets: usize,
    pub resolved_tickets: usize,
    pub escalated_tickets: usize,
    pub sla_compliance_rate: f64,
    /// Ticket count per creation day (`YYYY-MM-DD`)
    pub tickets_by_day: BTreeMap<String, usize>,
}

/// Dashboard snapshot of the desk right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RealtimeMetrics {
    pub active_tickets: i64,
    pub queue_depth: i64,
    pub agents_online: usize,
    pub total_agents: usize,
    /// Mean time to first response over today's tickets
    pub avg_response_time: i64,
    /// Mean time to resolution over today's tickets
    pub avg_resolution_time: i64,
    pub tickets_today: usize,
    pub resolved_today: usize,
}

/// Share of resolved tickets that met their resolution deadline.
///
/// Tickets without `resolved_at` are left out; no resolved tickets gives 0.
pub fn sla_compliance_rate(tickets: &[Ticket]) -> f64 {
    let mut resolved = 0usize;
    let mut compliant = 0usize;
    for ticket in tickets {
        if let Some(at) = ticket.resolved_at {
            resolved += 1;
            if at <= ticket.sla_resolution_deadline {
                compliant += 1;
            }
        }
    }

    if resolved == 0 {
        return 0.0;
    }
    round_percent(compliant as f64 / resolved as f64)
}

pub fn agent_performance(
    agent: &Agent,
    summary: AgentSummary,
    tickets: &[Ticket],
) -> AgentPerformance {
    let mut tickets_by_day = BTreeMap::new();
    for ticket in tickets {
        *tickets_by_day
            .entry(ticket.created_at.date().to_string())
            .or_insert(0) += 1;
    }

    AgentPerformance {
        agent: summary,
        tickets_handled: agent.tickets_handled,
        avg_resolution_time: agent.avg_resolution_time,
        total_tickets: tickets.len(),
        resolved_tickets: count_status(tickets, TicketStatus::Resolved),
        escalated_tickets: count_status(tickets, TicketStatus::Escalated),
        sla_compliance_rate: sla_compliance_rate(tickets),
        tickets_by_day,
    }
}

/// `today` is every ticket created since [`start_of_day`]
pub fn realtime_metrics(counts: TicketCounts, agents: &[Agent], today: &[Ticket]) -> RealtimeMetrics {
    let agents_online = agents
        .iter()
        .filter(|a| matches!(a.status, AgentStatus::Available | AgentStatus::Busy))
        .count();

    let response_secs: Vec<i64> = today
        .iter()
        .filter_map(|t| t.first_response_at.map(|at| (at - t.created_at).whole_seconds()))
        .collect();
    let resolution_secs: Vec<i64> = today
        .iter()
        .filter_map(|t| t.resolved_at.map(|at| (at - t.created_at).whole_seconds()))
        .collect();

    RealtimeMetrics {
        active_tickets: counts.active,
        queue_depth: counts.queued,
        agents_online,
        total_agents: agents.len(),
        avg_response_time: mean_secs(&response_secs),
        avg_resolution_time: mean_secs(&resolution_secs),
        tickets_today: today.len(),
        resolved_today: resolution_secs.len(),
    }
}

/// Midnight of `now`'s day, in `now`'s offset
pub fn start_of_day(now: OffsetDateTime) -> OffsetDateTime {
    now.replace_time(Time::MIDNIGHT)
}

fn count_status(tickets: &[Ticket], status: TicketStatus) -> usize {
    tickets.iter().filter(|t| t.status == status).count()
}

fn mean_secs(samples: &[i64]) -> i64 {
    if samples.is_empty() {
        return 0;
    }
    samples.iter().sum::<i64>().div_euclid(samples.len() as i64)
}

fn round_percent(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}
