//! SLA monitor
//!
//! Periodically escalates open tickets that missed their first-response or
//! resolution deadline. Escalation is guarded at the store, so a ticket is
//! escalated at most once no matter how many sweeps overlap with it.

use std::sync::Arc;

use time::OffsetDateTime;

use deskflow_shared::{breach_kind, DeskResult, TicketId};

use crate::notify::{Notifier, ServerEvent, Topic};
use crate::store::{load_detail, TicketStore};

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaSweep {
    /// Candidates the store returned
    pub examined: usize,
    /// Tickets this sweep moved to `escalated`
    pub escalated: usize,
}

#[derive(Clone)]
pub struct SlaMonitor {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
}

impl SlaMonitor {
    pub fn new(store: Arc<dyn TicketStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn check_breaches(&self) -> DeskResult<SlaSweep> {
        self.check_breaches_at(OffsetDateTime::now_utc()).await
    }

    /// Escalate every open ticket with a blown deadline at `now`.
    ///
    /// A failure on one ticket is logged and the sweep moves on; only a
    /// failed candidate query aborts the sweep.
    pub async fn check_breaches_at(&self, now: OffsetDateTime) -> DeskResult<SlaSweep> {
        let candidates = self.store.breach_candidates(now).await?;
        let mut sweep = SlaSweep {
            examined: candidates.len(),
            escalated: 0,
        };

        for candidate in candidates {
            match self.escalate(candidate.id, now).await {
                Ok(true) => sweep.escalated += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    error = %e,
                    ticket_id = %candidate.id,
                    "Failed to escalate ticket"
                ),
            }
        }

        if sweep.escalated > 0 {
            tracing::info!(
                examined = sweep.examined,
                escalated = sweep.escalated,
                "Processed SLA breaches"
            );
        } else {
            tracing::debug!(examined = sweep.examined, "No SLA breaches escalated");
        }

        Ok(sweep)
    }

    /// Scheduled entry point; failures are logged and the tick is abandoned
    pub async fn run_sla_tick(&self) {
        if let Err(e) = self.check_breaches().await {
            tracing::error!(error = %e, "SLA check tick failed");
        }
    }

    async fn escalate(&self, ticket_id: TicketId, now: OffsetDateTime) -> DeskResult<bool> {
        // Re-read so the reason reflects the ticket as it is now, not as selected
        let Some(ticket) = self.store.ticket(ticket_id).await? else {
            return Ok(false);
        };
        if ticket.status.is_closed_for_monitoring() {
            return Ok(false);
        }
        let Some(kind) = breach_kind(&ticket, now) else {
            tracing::debug!(ticket_id = %ticket_id, "Breach cleared before escalation");
            return Ok(false);
        };

        let Some(escalated) = self
            .store
            .escalate_if_breached(ticket_id, kind, now)
            .await?
        else {
            tracing::debug!(ticket_id = %ticket_id, "Ticket changed concurrently; not escalated");
            return Ok(false);
        };

        let detail = load_detail(self.store.as_ref(), escalated).await;

        self.notifier
            .publish(
                Topic::Admins,
                ServerEvent::SlaBreach {
                    ticket: detail.clone(),
                },
            )
            .await;
        self.notifier
            .publish(Topic::Agents, ServerEvent::TicketUpdated { ticket: detail })
            .await;

        tracing::info!(ticket_id = %ticket_id, reason = kind.reason(), "Ticket auto-escalated");
        Ok(true)
    }
}
