//! SLA clock evaluation
//!
//! Pure functions over a ticket's two independent deadlines. The monitor uses
//! [`breach_kind`] to decide whether and why to escalate; dashboards and
//! request handlers use [`sla_status`] to render traffic-light state.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Ticket;

/// Below this fraction of the window remaining, a clock is critical
const CRITICAL_FRACTION: f64 = 0.2;
/// Below this fraction of the window remaining, a clock is in warning
const WARNING_FRACTION: f64 = 0.5;

/// Traffic-light state of a single SLA clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaState {
    Ok,
    Warning,
    Critical,
    Breached,
    Met,
}

/// State of one clock plus how far it is from its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaClock {
    pub status: SlaState,
    /// Whole seconds left before the deadline (0 once met or breached)
    pub remaining_secs: i64,
    /// Whole seconds past the deadline (0 unless breached)
    pub overdue_secs: i64,
}

impl SlaClock {
    fn met() -> Self {
        Self {
            status: SlaState::Met,
            remaining_secs: 0,
            overdue_secs: 0,
        }
    }
}

/// Both SLA clocks of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaStatus {
    pub response: SlaClock,
    pub resolution: SlaClock,
}

/// Evaluate a single clock.
///
/// A set completion timestamp always wins. Otherwise the fraction of the
/// window still remaining decides the state; a zero-length window is treated
/// as immediately critical.
pub fn evaluate_clock(
    created_at: OffsetDateTime,
    deadline: OffsetDateTime,
    met_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> SlaClock {
    if met_at.is_some() {
        return SlaClock::met();
    }

    let remaining = deadline - now;
    if remaining.is_negative() {
        return SlaClock {
            status: SlaState::Breached,
            remaining_secs: 0,
            overdue_secs: remaining.abs().whole_seconds(),
        };
    }

    let window = deadline - created_at;
    let status = if window.is_zero() || window.is_negative() {
        SlaState::Critical
    } else {
        let fraction = remaining.as_seconds_f64() / window.as_seconds_f64();
        if fraction < CRITICAL_FRACTION {
            SlaState::Critical
        } else if fraction < WARNING_FRACTION {
            SlaState::Warning
        } else {
            SlaState::Ok
        }
    };

    SlaClock {
        status,
        remaining_secs: remaining.whole_seconds(),
        overdue_secs: 0,
    }
}

/// Derived SLA status of a ticket at `now`
pub fn sla_status(ticket: &Ticket, now: OffsetDateTime) -> SlaStatus {
    SlaStatus {
        response: evaluate_clock(
            ticket.created_at,
            ticket.sla_response_deadline,
            ticket.first_response_at,
            now,
        ),
        resolution: evaluate_clock(
            ticket.created_at,
            ticket.sla_resolution_deadline,
            ticket.resolved_at,
            now,
        ),
    }
}

/// Which deadlines a ticket has blown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    Response,
    Resolution,
    Both,
}

impl BreachKind {
    /// Whether the first-response deadline is part of this breach
    pub fn response(&self) -> bool {
        matches!(self, Self::Response | Self::Both)
    }

    pub fn resolution(&self) -> bool {
        matches!(self, Self::Resolution | Self::Both)
    }

    /// Text stored in `escalation_reason`
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Both => "SLA breach: Both response and resolution deadlines exceeded",
            Self::Response => "SLA breach: Response deadline exceeded",
            Self::Resolution => "SLA breach: Resolution deadline exceeded",
        }
    }
}

/// Evaluate both breach conditions independently
pub fn breach_kind(ticket: &Ticket, now: OffsetDateTime) -> Option<BreachKind> {
    match (ticket.response_breached(now), ticket.resolution_breached(now)) {
        (true, true) => Some(BreachKind::Both),
        (true, false) => Some(BreachKind::Response),
        (false, true) => Some(BreachKind::Resolution),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TicketId, TicketPriority, TicketStatus, UserId};
    use time::macros::datetime;
    use time::Duration;

    fn ticket(created_at: OffsetDateTime, response_h: i64, resolution_h: i64) -> Ticket {
        Ticket {
            id: TicketId::new(),
            customer_id: UserId::new(),
            customer_name: "Casey".to_string(),
            customer_email: "casey@example.com".to_string(),
            subject: "Printer on fire".to_string(),
            description: None,
            category: None,
            status: TicketStatus::New,
            priority: TicketPriority::Medium,
            assigned_agent_id: None,
            created_at,
            updated_at: created_at,
            first_response_at: None,
            resolved_at: None,
            sla_response_deadline: created_at + Duration::hours(response_h),
            sla_resolution_deadline: created_at + Duration::hours(resolution_h),
            escalation_reason: None,
        }
    }

    #[test]
    fn test_met_wins_regardless_of_deadline() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let far_past_deadline = created - Duration::days(30);
        let clock = evaluate_clock(
            created,
            far_past_deadline,
            Some(created),
            datetime!(2024-06-01 00:00 UTC),
        );
        assert_eq!(clock.status, SlaState::Met);
    }

    #[test]
    fn test_past_deadline_is_breached() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let deadline = created + Duration::hours(2);
        let clock = evaluate_clock(created, deadline, None, deadline + Duration::seconds(90));
        assert_eq!(clock.status, SlaState::Breached);
        assert_eq!(clock.overdue_secs, 90);
        assert_eq!(clock.remaining_secs, 0);
    }

    #[test]
    fn test_fraction_thresholds() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let deadline = created + Duration::hours(10);

        // 8h of 10h left
        let ok = evaluate_clock(created, deadline, None, created + Duration::hours(2));
        assert_eq!(ok.status, SlaState::Ok);
        assert_eq!(ok.remaining_secs, 8 * 3600);

        // exactly half left is still ok
        let half = evaluate_clock(created, deadline, None, created + Duration::hours(5));
        assert_eq!(half.status, SlaState::Ok);

        // 3h of 10h left
        let warning = evaluate_clock(created, deadline, None, created + Duration::hours(7));
        assert_eq!(warning.status, SlaState::Warning);

        // 1h of 10h left
        let critical = evaluate_clock(created, deadline, None, created + Duration::hours(9));
        assert_eq!(critical.status, SlaState::Critical);
    }

    #[test]
    fn test_zero_length_window_is_critical() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let clock = evaluate_clock(created, created, None, created);
        assert_eq!(clock.status, SlaState::Critical);
    }

    #[test]
    fn test_sla_status_evaluates_clocks_independently() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let mut t = ticket(created, 2, 24);
        t.first_response_at = Some(created + Duration::minutes(30));

        let status = sla_status(&t, created + Duration::hours(3));
        assert_eq!(status.response.status, SlaState::Met);
        assert_eq!(status.resolution.status, SlaState::Ok);
    }

    #[test]
    fn test_breach_kind() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let t = ticket(created, 2, 24);

        assert_eq!(breach_kind(&t, created + Duration::hours(1)), None);
        assert_eq!(
            breach_kind(&t, created + Duration::hours(2) + Duration::seconds(1)),
            Some(BreachKind::Response)
        );
        assert_eq!(
            breach_kind(&t, created + Duration::hours(25)),
            Some(BreachKind::Both)
        );

        let mut responded = t.clone();
        responded.first_response_at = Some(created + Duration::minutes(5));
        assert_eq!(
            breach_kind(&responded, created + Duration::hours(25)),
            Some(BreachKind::Resolution)
        );
    }

    #[test]
    fn test_deadline_equal_to_now_is_not_breached() {
        let created = datetime!(2024-01-01 00:00 UTC);
        let t = ticket(created, 2, 24);
        assert_eq!(breach_kind(&t, t.sla_response_deadline), None);
    }

    #[test]
    fn test_reason_text() {
        assert_eq!(
            BreachKind::Resolution.reason(),
            "SLA breach: Resolution deadline exceeded"
        );
        assert_eq!(
            BreachKind::Response.reason(),
            "SLA breach: Response deadline exceeded"
        );
    }
}
