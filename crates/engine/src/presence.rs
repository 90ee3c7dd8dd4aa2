//! Agent availability
//!
//! Status changes made by the agent, and the forced `offline` when their last
//! live connection goes away.

use std::sync::Arc;

use deskflow_shared::{Agent, AgentId, AgentStatus, DeskError, DeskResult, UserId};

use crate::notify::{Notifier, ServerEvent, Topic};
use crate::store::TicketStore;

#[derive(Clone)]
pub struct AgentPresence {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
}

impl AgentPresence {
    pub fn new(store: Arc<dyn TicketStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn set_agent_status(
        &self,
        agent_id: AgentId,
        status: AgentStatus,
    ) -> DeskResult<Agent> {
        let agent = self
            .store
            .set_agent_status(agent_id, status)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Agent {}", agent_id)))?;

        self.announce(&agent).await;
        Ok(agent)
    }

    /// Force the user's agent profile offline, if they have one
    pub async fn handle_disconnect(&self, user_id: UserId) -> DeskResult<Option<Agent>> {
        let Some(agent) = self.store.agent_by_user(user_id).await? else {
            return Ok(None);
        };

        let Some(agent) = self
            .store
            .set_agent_status(agent.id, AgentStatus::Offline)
            .await?
        else {
            return Ok(None);
        };

        tracing::info!(agent_id = %agent.id, user_id = %user_id, "Agent went offline on disconnect");
        self.announce(&agent).await;
        Ok(Some(agent))
    }

    async fn announce(&self, agent: &Agent) {
        self.notifier
            .publish(
                Topic::Admins,
                ServerEvent::AgentStatusChanged {
                    agent_id: agent.id,
                    user_id: agent.user_id,
                    status: agent.status,
                },
            )
            .await;
    }
}
