//! Postgres-backed store
//!
//! Each guard lives in the `WHERE` clause of a single statement, and
//! `RETURNING` (or `rows_affected`) tells the caller whether it won.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use deskflow_shared::{
    Agent, AgentId, AgentStatus, AgentSummary, BreachKind, DeskResult, QueueConfig, SlaPolicy,
    Ticket, TicketCounts, TicketDetail, TicketId, TicketMessage, TicketPriority, TicketStatus,
    User, UserId, UserSummary,
};

use super::{ClaimGuard, TicketStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Ticket row joined with its customer and assigned agent
#[derive(FromRow)]
struct TicketDetailRow {
    #[sqlx(flatten)]
    ticket: Ticket,
    customer_user_name: Option<String>,
    customer_user_email: Option<String>,
    agent_user_id: Option<UserId>,
    agent_name: Option<String>,
    agent_email: Option<String>,
    agent_status: Option<AgentStatus>,
}

impl From<TicketDetailRow> for TicketDetail {
    fn from(row: TicketDetailRow) -> Self {
        let customer = match (row.customer_user_name, row.customer_user_email) {
            (Some(name), Some(email)) => Some(UserSummary {
                id: row.ticket.customer_id,
                name,
                email,
            }),
            _ => None,
        };

        let assigned_agent = match (
            row.ticket.assigned_agent_id,
            row.agent_user_id,
            row.agent_name,
            row.agent_email,
            row.agent_status,
        ) {
            (Some(id), Some(user_id), Some(name), Some(email), Some(status)) => {
                Some(AgentSummary {
                    id,
                    user_id,
                    name,
                    email,
                    status,
                })
            }
            _ => None,
        };

        TicketDetail {
            ticket: row.ticket,
            customer,
            assigned_agent,
        }
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn ticket(&self, id: TicketId) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn ticket_detail(&self, id: TicketId) -> DeskResult<Option<TicketDetail>> {
        let row: Option<TicketDetailRow> = sqlx::query_as(
            r#"
            SELECT t.*,
                   cu.name   AS customer_user_name,
                   cu.email  AS customer_user_email,
                   a.user_id AS agent_user_id,
                   au.name   AS agent_name,
                   au.email  AS agent_email,
                   a.status  AS agent_status
            FROM tickets t
            LEFT JOIN users cu ON cu.id = t.customer_id
            LEFT JOIN agents a ON a.id = t.assigned_agent_id
            LEFT JOIN users au ON au.id = a.user_id
            WHERE t.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TicketDetail::from))
    }

    async fn agent(&self, id: AgentId) -> DeskResult<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agent)
    }

    async fn agent_by_user(&self, user_id: UserId) -> DeskResult<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agent)
    }

    async fn user(&self, id: UserId) -> DeskResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn next_queued_ticket(&self) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE status = 'new' AND assigned_agent_id IS NULL
            ORDER BY CASE priority
                         WHEN 'urgent' THEN 4
                         WHEN 'high' THEN 3
                         WHEN 'medium' THEN 2
                         ELSE 1
                     END DESC,
                     created_at ASC,
                     id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn queued_tickets(&self) -> DeskResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE status = 'new' AND assigned_agent_id IS NULL
            ORDER BY CASE priority
                         WHEN 'urgent' THEN 4
                         WHEN 'high' THEN 3
                         WHEN 'medium' THEN 2
                         ELSE 1
                     END DESC,
                     created_at ASC,
                     id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn available_agents(&self) -> DeskResult<Vec<Agent>> {
        let agents = sqlx::query_as::<_, Agent>(
            r#"
            SELECT * FROM agents
            WHERE status = 'available'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(agents)
    }

    async fn open_tickets_for_agent(&self, agent_id: AgentId) -> DeskResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE assigned_agent_id = $1 AND status <> 'resolved'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn breach_candidates(&self, now: OffsetDateTime) -> DeskResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE status NOT IN ('resolved', 'escalated')
              AND (
                    (first_response_at IS NULL AND sla_response_deadline < $1)
                 OR (resolved_at IS NULL AND sla_resolution_deadline < $1)
              )
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn ticket_messages(&self, ticket_id: TicketId) -> DeskResult<Vec<TicketMessage>> {
        let messages = sqlx::query_as::<_, TicketMessage>(
            r#"
            SELECT * FROM ticket_messages
            WHERE ticket_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn agents(&self) -> DeskResult<Vec<Agent>> {
        let agents =
            sqlx::query_as::<_, Agent>("SELECT * FROM agents ORDER BY created_at ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(agents)
    }

    async fn tickets_for_agent(
        &self,
        agent_id: AgentId,
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    ) -> DeskResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE assigned_agent_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(agent_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn tickets_created_since(&self, since: OffsetDateTime) -> DeskResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE created_at >= $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn ticket_counts(&self) -> DeskResult<TicketCounts> {
        let (active, queued): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status <> 'resolved'),
                COUNT(*) FILTER (WHERE status = 'new' AND assigned_agent_id IS NULL)
            FROM tickets
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(TicketCounts { active, queued })
    }

    async fn claim_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
        guard: ClaimGuard,
    ) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET assigned_agent_id = $2,
                status = 'assigned',
                updated_at = NOW()
            WHERE id = $1
              AND assigned_agent_id IS NULL
              AND status <> 'resolved'
              AND ($3 = FALSE OR status = 'new')
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(agent_id)
        .bind(guard == ClaimGuard::Queued)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn reassign_ticket(
        &self,
        ticket_id: TicketId,
        agent_id: AgentId,
    ) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET assigned_agent_id = $2,
                status = CASE WHEN status = 'new' THEN 'assigned' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn escalate_if_breached(
        &self,
        ticket_id: TicketId,
        kind: BreachKind,
        now: OffsetDateTime,
    ) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = 'escalated',
                escalation_reason = $2,
                updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('resolved', 'escalated')
              AND (first_response_at IS NULL AND sla_response_deadline < $3) = $4
              AND (resolved_at IS NULL AND sla_resolution_deadline < $3) = $5
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(kind.reason())
        .bind(now)
        .bind(kind.response())
        .bind(kind.resolution())
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn set_first_response_if_absent(
        &self,
        ticket_id: TicketId,
        at: OffsetDateTime,
    ) -> DeskResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET first_response_at = $2, updated_at = NOW()
            WHERE id = $1 AND first_response_at IS NULL
            "#,
        )
        .bind(ticket_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_resolved_if_absent(
        &self,
        ticket_id: TicketId,
        at: OffsetDateTime,
    ) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET resolved_at = $2, updated_at = NOW()
            WHERE id = $1 AND resolved_at IS NULL
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn set_status(
        &self,
        ticket_id: TicketId,
        status: TicketStatus,
        escalation_reason: Option<&str>,
    ) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = $2,
                escalation_reason = COALESCE($3, escalation_reason),
                updated_at = NOW()
            WHERE id = $1
              AND NOT ($2 = 'new' AND assigned_agent_id IS NOT NULL)
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(status.as_str())
        .bind(escalation_reason)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn transition_status(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
    ) -> DeskResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(ticket_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_priority(
        &self,
        ticket_id: TicketId,
        priority: TicketPriority,
    ) -> DeskResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET priority = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(priority.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn set_agent_status(
        &self,
        agent_id: AgentId,
        status: AgentStatus,
    ) -> DeskResult<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>(
            "UPDATE agents SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(agent_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    async fn record_resolution(
        &self,
        agent_id: AgentId,
        resolution_secs: i64,
    ) -> DeskResult<Option<Agent>> {
        // Right-hand sides see the pre-update row, so tickets_handled is n - 1 here
        let agent = sqlx::query_as::<_, Agent>(
            r#"
            UPDATE agents
            SET tickets_handled = tickets_handled + 1,
                avg_resolution_time = CASE
                    WHEN avg_resolution_time IS NULL OR tickets_handled = 0 THEN $2
                    ELSE (avg_resolution_time * tickets_handled + $2) / (tickets_handled + 1)
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(agent_id)
        .bind(resolution_secs)
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    async fn queue_config_or_default(&self, seed: SlaPolicy) -> DeskResult<QueueConfig> {
        sqlx::query(
            r#"
            INSERT INTO queue_config (id, last_assigned_agent_index, sla_response_hours, sla_resolution_hours)
            VALUES ($1, 0, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(QueueConfig::SINGLETON_ID)
        .bind(seed.response_hours)
        .bind(seed.resolution_hours)
        .execute(&self.pool)
        .await?;

        let config =
            sqlx::query_as::<_, QueueConfig>("SELECT * FROM queue_config WHERE id = $1")
                .bind(QueueConfig::SINGLETON_ID)
                .fetch_one(&self.pool)
                .await?;
        Ok(config)
    }

    async fn update_sla_policy(&self, policy: SlaPolicy) -> DeskResult<Option<QueueConfig>> {
        let config = sqlx::query_as::<_, QueueConfig>(
            r#"
            UPDATE queue_config
            SET sla_response_hours = $2, sla_resolution_hours = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(QueueConfig::SINGLETON_ID)
        .bind(policy.response_hours)
        .bind(policy.resolution_hours)
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }

    async fn advance_cursor(&self, expected: i32, next: i32) -> DeskResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE queue_config
            SET last_assigned_agent_index = $3, updated_at = NOW()
            WHERE id = $1 AND last_assigned_agent_index = $2
            "#,
        )
        .bind(QueueConfig::SINGLETON_ID)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_user(&self, user: &User) -> DeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_agent(&self, agent: &Agent) -> DeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (id, user_id, status, current_shift_start, current_shift_end,
                                tickets_handled, avg_resolution_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(agent.id)
        .bind(agent.user_id)
        .bind(agent.status)
        .bind(agent.current_shift_start)
        .bind(agent.current_shift_end)
        .bind(agent.tickets_handled)
        .bind(agent.avg_resolution_time)
        .bind(agent.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> DeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, customer_id, customer_name, customer_email, subject,
                                 description, category, status, priority, assigned_agent_id,
                                 created_at, updated_at, first_response_at, resolved_at,
                                 sla_response_deadline, sla_resolution_deadline, escalation_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.customer_id)
        .bind(&ticket.customer_name)
        .bind(&ticket.customer_email)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(&ticket.category)
        .bind(ticket.status)
        .bind(ticket.priority)
        .bind(ticket.assigned_agent_id)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .bind(ticket.first_response_at)
        .bind(ticket.resolved_at)
        .bind(ticket.sla_response_deadline)
        .bind(ticket.sla_resolution_deadline)
        .bind(&ticket.escalation_reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_message(&self, message: &TicketMessage) -> DeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_messages (id, ticket_id, sender_id, sender_type, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.ticket_id)
        .bind(message.sender_id)
        .bind(message.sender_type)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use deskflow_shared::{create_pool, run_migrations, UserRole};
    use time::Duration;
    use uuid::Uuid;

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url, 2).await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        PgStore::new(pool)
    }

    async fn customer(store: &PgStore) -> User {
        let user = User {
            id: UserId::new(),
            name: "Pat".to_string(),
            email: format!("pat-{}@example.com", Uuid::new_v4()),
            role: UserRole::Customer,
            created_at: OffsetDateTime::now_utc(),
        };
        store.insert_user(&user).await.unwrap();
        user
    }

    async fn agent(store: &PgStore) -> Agent {
        let user = User {
            id: UserId::new(),
            name: "Sam".to_string(),
            email: format!("sam-{}@example.com", Uuid::new_v4()),
            role: UserRole::Agent,
            created_at: OffsetDateTime::now_utc(),
        };
        store.insert_user(&user).await.unwrap();
        let agent = Agent {
            id: AgentId::new(),
            user_id: user.id,
            status: AgentStatus::Available,
            current_shift_start: None,
            current_shift_end: None,
            tickets_handled: 0,
            avg_resolution_time: None,
            created_at: OffsetDateTime::now_utc(),
        };
        store.insert_agent(&agent).await.unwrap();
        agent
    }

    fn ticket(customer: &User, created_at: OffsetDateTime) -> Ticket {
        let (response, resolution) = SlaPolicy::default().deadlines(created_at).unwrap();
        Ticket {
            id: TicketId::new(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            subject: "Billing question".to_string(),
            description: Some("Charged twice".to_string()),
            category: Some("billing".to_string()),
            status: TicketStatus::New,
            priority: TicketPriority::High,
            assigned_agent_id: None,
            created_at,
            updated_at: created_at,
            first_response_at: None,
            resolved_at: None,
            sla_response_deadline: response,
            sla_resolution_deadline: resolution,
            escalation_reason: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_claim_and_detail() {
        let store = store().await;
        let customer = customer(&store).await;
        let agent = agent(&store).await;
        let t = ticket(&customer, OffsetDateTime::now_utc());
        store.insert_ticket(&t).await.unwrap();

        let claimed = store
            .claim_ticket(t.id, agent.id, ClaimGuard::Queued)
            .await
            .unwrap()
            .expect("claim should win");
        assert_eq!(claimed.status, TicketStatus::Assigned);

        let again = store
            .claim_ticket(t.id, agent.id, ClaimGuard::Unassigned)
            .await
            .unwrap();
        assert!(again.is_none());

        let detail = store.ticket_detail(t.id).await.unwrap().unwrap();
        assert_eq!(detail.customer.map(|c| c.id), Some(customer.id));
        assert_eq!(detail.assigned_agent.map(|a| a.id), Some(agent.id));
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_escalation_and_timestamps_are_guarded() {
        let store = store().await;
        let customer = customer(&store).await;
        let created = OffsetDateTime::now_utc() - Duration::hours(3);
        let t = ticket(&customer, created);
        store.insert_ticket(&t).await.unwrap();

        let candidates = store
            .breach_candidates(OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(candidates.iter().any(|c| c.id == t.id));

        let now = OffsetDateTime::now_utc();
        // Only the response deadline is blown, so a stale "both" judgement loses
        assert!(store
            .escalate_if_breached(t.id, BreachKind::Both, now)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .escalate_if_breached(t.id, BreachKind::Response, now)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .escalate_if_breached(t.id, BreachKind::Response, now)
            .await
            .unwrap()
            .is_none());

        assert!(store.set_first_response_if_absent(t.id, now).await.unwrap());
        assert!(!store.set_first_response_if_absent(t.id, now).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_tickets_for_agent_range() {
        let store = store().await;
        let customer = customer(&store).await;
        let agent = agent(&store).await;
        let now = OffsetDateTime::now_utc();

        let old = ticket(&customer, now - Duration::days(10));
        let recent = ticket(&customer, now - Duration::hours(1));
        for t in [&old, &recent] {
            store.insert_ticket(t).await.unwrap();
            store
                .claim_ticket(t.id, agent.id, ClaimGuard::Queued)
                .await
                .unwrap()
                .unwrap();
        }

        let all = store.tickets_for_agent(agent.id, None, None).await.unwrap();
        let ids: Vec<TicketId> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![recent.id, old.id]);

        let week = store
            .tickets_for_agent(agent.id, Some(now - Duration::days(7)), None)
            .await
            .unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].id, recent.id);

        let counts = store.ticket_counts().await.unwrap();
        assert!(counts.active >= 2);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_record_resolution_running_mean() {
        let store = store().await;
        let agent = agent(&store).await;

        store.record_resolution(agent.id, 600).await.unwrap();
        let updated = store
            .record_resolution(agent.id, 1200)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.tickets_handled, 2);
        assert_eq!(updated.avg_resolution_time, Some(900));
    }
}
