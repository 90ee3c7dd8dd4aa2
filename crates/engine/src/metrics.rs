//! Reporting over the ticket store
//!
//! Loads the rows a report needs and hands them to the pure aggregations in
//! `deskflow_shared::metrics`.

use std::sync::Arc;

use time::OffsetDateTime;

use deskflow_shared::{
    agent_performance, realtime_metrics, start_of_day, Agent, AgentId, AgentPerformance,
    AgentSummary, DeskError, DeskResult, RealtimeMetrics,
};

use crate::store::TicketStore;

#[derive(Clone)]
pub struct MetricsService {
    store: Arc<dyn TicketStore>,
}

impl MetricsService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Performance of one agent over tickets created within `[from, to]`
    pub async fn agent_performance(
        &self,
        agent_id: AgentId,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> DeskResult<AgentPerformance> {
        let agent = self
            .store
            .agent(agent_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Agent {}", agent_id)))?;
        self.performance_of(&agent, from, to).await
    }

    /// Every agent's performance over all their tickets
    pub async fn agents_performance(&self) -> DeskResult<Vec<AgentPerformance>> {
        let agents = self.store.agents().await?;
        let mut report = Vec::with_capacity(agents.len());
        for agent in &agents {
            report.push(self.performance_of(agent, None, None).await?);
        }
        Ok(report)
    }

    /// Live counts plus today's averages, "today" starting at midnight of `now`
    pub async fn realtime(&self, now: OffsetDateTime) -> DeskResult<RealtimeMetrics> {
        let counts = self.store.ticket_counts().await?;
        let agents = self.store.agents().await?;
        let today = self.store.tickets_created_since(start_of_day(now)).await?;

        let metrics = realtime_metrics(counts, &agents, &today);
        tracing::debug!(
            active = metrics.active_tickets,
            queued = metrics.queue_depth,
            agents_online = metrics.agents_online,
            "Realtime metrics computed"
        );
        Ok(metrics)
    }

    async fn performance_of(
        &self,
        agent: &Agent,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> DeskResult<AgentPerformance> {
        let user = self
            .store
            .user(agent.user_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("User {}", agent.user_id)))?;
        let tickets = self.store.tickets_for_agent(agent.id, from, to).await?;

        Ok(agent_performance(
            agent,
            AgentSummary::new(agent, &user),
            &tickets,
        ))
    }
}
