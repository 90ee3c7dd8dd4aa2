//! SLA monitor sweeps against the in-memory store

#![allow(clippy::unwrap_used)]

mod common;

use time::Duration;

use common::{Harness, T0};
use deskflow_engine::{ServerEvent, SlaSweep, TicketStore, Topic};
use deskflow_shared::{BreachKind, TicketPriority, TicketStatus};

#[tokio::test]
async fn test_missed_first_response_is_escalated() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Medium, T0).await;
    assert_eq!(ticket.sla_response_deadline, T0 + Duration::hours(2));

    let now = T0 + Duration::hours(2) + Duration::seconds(1);
    let sweep = h.monitor.check_breaches_at(now).await.unwrap();
    assert_eq!(
        sweep,
        SlaSweep {
            examined: 1,
            escalated: 1
        }
    );

    let stored = h.reload(ticket.id).await;
    assert_eq!(stored.status, TicketStatus::Escalated);
    assert_eq!(
        stored.escalation_reason.as_deref(),
        Some("SLA breach: Response deadline exceeded")
    );
}

#[tokio::test]
async fn test_deadline_equal_to_now_is_not_a_breach() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Medium, T0).await;

    let sweep = h
        .monitor
        .check_breaches_at(T0 + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(sweep, SlaSweep::default());
    assert_eq!(h.reload(ticket.id).await.status, TicketStatus::New);
}

#[tokio::test]
async fn test_missed_resolution_after_response() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let agent = h.agent("Ana", T0).await;
    let ticket = h.ticket(&customer, TicketPriority::High, T0).await;

    h.queue.take_ticket(ticket.id, agent.user_id).await.unwrap();
    h.tickets
        .post_message(ticket.id, agent.user_id, "On it", T0 + Duration::minutes(30))
        .await
        .unwrap();

    let now = T0 + Duration::hours(25);
    h.monitor.check_breaches_at(now).await.unwrap();

    let stored = h.reload(ticket.id).await;
    assert_eq!(stored.status, TicketStatus::Escalated);
    assert_eq!(
        stored.escalation_reason.as_deref(),
        Some("SLA breach: Resolution deadline exceeded")
    );
    assert_eq!(stored.assigned_agent_id, Some(agent.id));
}

#[tokio::test]
async fn test_both_deadlines_missed() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Low, T0).await;

    h.monitor
        .check_breaches_at(T0 + Duration::days(2))
        .await
        .unwrap();

    assert_eq!(
        h.reload(ticket.id).await.escalation_reason.as_deref(),
        Some("SLA breach: Both response and resolution deadlines exceeded")
    );
}

#[tokio::test]
async fn test_second_sweep_changes_nothing() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Medium, T0).await;
    let now = T0 + Duration::hours(3);

    h.monitor.check_breaches_at(now).await.unwrap();
    let first = h.reload(ticket.id).await;
    h.notifier.clear();

    let sweep = h
        .monitor
        .check_breaches_at(now + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(sweep, SlaSweep::default());

    let second = h.reload(ticket.id).await;
    assert_eq!(second.status, TicketStatus::Escalated);
    assert_eq!(second.escalation_reason, first.escalation_reason);
    assert_eq!(second.updated_at, first.updated_at);
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn test_reply_after_judgement_blocks_response_escalation() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Medium, T0).await;
    let now = T0 + Duration::hours(3);

    h.store
        .set_first_response_if_absent(ticket.id, now - Duration::minutes(5))
        .await
        .unwrap();
    let escalated = h
        .store
        .escalate_if_breached(ticket.id, BreachKind::Response, now)
        .await
        .unwrap();
    assert!(escalated.is_none());

    let sweep = h.monitor.check_breaches_at(now).await.unwrap();
    assert_eq!(sweep, SlaSweep::default());
    assert_eq!(h.reload(ticket.id).await.status, TicketStatus::New);
}

#[tokio::test]
async fn test_resolved_and_escalated_tickets_are_left_alone() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let resolved = h.ticket(&customer, TicketPriority::Medium, T0).await;
    let escalated = h.ticket(&customer, TicketPriority::Medium, T0).await;

    h.store
        .set_status(resolved.id, TicketStatus::Resolved, None)
        .await
        .unwrap()
        .unwrap();
    h.store
        .set_status(escalated.id, TicketStatus::Escalated, Some("Customer is a VIP"))
        .await
        .unwrap()
        .unwrap();

    let sweep = h
        .monitor
        .check_breaches_at(T0 + Duration::days(3))
        .await
        .unwrap();
    assert_eq!(sweep.escalated, 0);

    assert_eq!(h.reload(resolved.id).await.status, TicketStatus::Resolved);
    assert_eq!(
        h.reload(escalated.id).await.escalation_reason.as_deref(),
        Some("Customer is a VIP")
    );
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn test_escalation_notifies_admins_and_agents() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Urgent, T0).await;

    h.monitor
        .check_breaches_at(T0 + Duration::hours(3))
        .await
        .unwrap();

    assert_eq!(
        h.notifier.published(),
        vec![(Topic::Admins, "sla-breach"), (Topic::Agents, "ticket-updated")]
    );

    let events = h.notifier.events();
    let ServerEvent::SlaBreach { ticket: detail } = &events[0].1 else {
        panic!("expected sla-breach");
    };
    assert_eq!(detail.ticket.id, ticket.id);
    assert_eq!(detail.ticket.status, TicketStatus::Escalated);
    assert_eq!(detail.customer.as_ref().unwrap().name, "Casey");
}

#[tokio::test]
async fn test_sweep_escalates_every_breached_ticket() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let late = h.ticket(&customer, TicketPriority::Low, T0).await;
    let later = h
        .ticket(&customer, TicketPriority::Low, T0 + Duration::minutes(10))
        .await;
    let fresh = h
        .ticket(&customer, TicketPriority::Low, T0 + Duration::hours(2))
        .await;

    let sweep = h
        .monitor
        .check_breaches_at(T0 + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(sweep.escalated, 2);

    assert_eq!(h.reload(late.id).await.status, TicketStatus::Escalated);
    assert_eq!(h.reload(later.id).await.status, TicketStatus::Escalated);
    assert_eq!(h.reload(fresh.id).await.status, TicketStatus::New);
}

#[tokio::test]
async fn test_store_failure_aborts_sweep_and_tick_survives() {
    let h = Harness::new();
    let customer = h.customer("Casey").await;
    let ticket = h.ticket(&customer, TicketPriority::Medium, T0).await;

    h.store.set_offline(true);
    let err = h
        .monitor
        .check_breaches_at(T0 + Duration::hours(3))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    h.monitor.run_sla_tick().await;

    h.store.set_offline(false);
    assert_eq!(h.reload(ticket.id).await.status, TicketStatus::New);
    assert!(h.notifier.events().is_empty());
}
