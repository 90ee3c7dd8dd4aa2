//! Shared fixtures for engine integration tests

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::macros::datetime;
use time::OffsetDateTime;

use deskflow_engine::{
    AgentPresence, MemoryStore, MetricsService, Notifier, QueueService, ServerEvent, SlaMonitor,
    TicketService, TicketStore, Topic,
};
use deskflow_shared::{
    Agent, AgentId, AgentStatus, SlaPolicy, Ticket, TicketId, TicketPriority, TicketStatus, User,
    UserId, UserRole,
};

pub const T0: OffsetDateTime = datetime!(2024-05-06 09:00 UTC);

/// Notifier that remembers every publish
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Topic, ServerEvent)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Topic, ServerEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// `(topic, event name)` pairs in publish order
    pub fn published(&self) -> Vec<(Topic, &'static str)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, event)| (*topic, event.name()))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: Topic, event: ServerEvent) {
        self.events.lock().unwrap().push((topic, event));
    }
}

/// In-memory store, recording notifier and every service wired together
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub queue: QueueService,
    pub monitor: SlaMonitor,
    pub tickets: TicketService,
    pub presence: AgentPresence,
    pub metrics: MetricsService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        Self::with_notifier(store, notifier.clone() as Arc<dyn Notifier>, notifier)
    }

    /// Wire services to `sink` while keeping a recorder for assertions
    pub fn with_notifier(
        store: Arc<MemoryStore>,
        sink: Arc<dyn Notifier>,
        recorder: Arc<RecordingNotifier>,
    ) -> Self {
        let dyn_store: Arc<dyn TicketStore> = store.clone();
        let policy = SlaPolicy::default();

        Self {
            queue: QueueService::new(dyn_store.clone(), sink.clone(), policy),
            monitor: SlaMonitor::new(dyn_store.clone(), sink.clone()),
            tickets: TicketService::new(dyn_store.clone(), sink.clone(), policy),
            presence: AgentPresence::new(dyn_store.clone(), sink),
            metrics: MetricsService::new(dyn_store),
            store,
            notifier: recorder,
        }
    }

    pub async fn customer(&self, name: &str) -> User {
        self.user(name, UserRole::Customer).await
    }

    pub async fn user(&self, name: &str, role: UserRole) -> User {
        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role,
            created_at: T0,
        };
        self.store.insert_user(&user).await.unwrap();
        user
    }

    /// Available agent with no shift restriction; `created_at` fixes round-robin order
    pub async fn agent(&self, name: &str, created_at: OffsetDateTime) -> Agent {
        self.agent_with(name, created_at, AgentStatus::Available, None)
            .await
    }

    pub async fn agent_with(
        &self,
        name: &str,
        created_at: OffsetDateTime,
        status: AgentStatus,
        shift: Option<(OffsetDateTime, OffsetDateTime)>,
    ) -> Agent {
        let user = self.user(name, UserRole::Agent).await;
        let agent = Agent {
            id: AgentId::new(),
            user_id: user.id,
            status,
            current_shift_start: shift.map(|(start, _)| start),
            current_shift_end: shift.map(|(_, end)| end),
            tickets_handled: 0,
            avg_resolution_time: None,
            created_at,
        };
        self.store.insert_agent(&agent).await.unwrap();
        agent
    }

    /// Queued ticket with default-policy deadlines from `created_at`
    pub async fn ticket(
        &self,
        customer: &User,
        priority: TicketPriority,
        created_at: OffsetDateTime,
    ) -> Ticket {
        let (response, resolution) = SlaPolicy::default().deadlines(created_at).unwrap();
        let ticket = Ticket {
            id: TicketId::new(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            subject: format!("{} ticket", priority.as_str()),
            description: None,
            category: None,
            status: TicketStatus::New,
            priority,
            assigned_agent_id: None,
            created_at,
            updated_at: created_at,
            first_response_at: None,
            resolved_at: None,
            sla_response_deadline: response,
            sla_resolution_deadline: resolution,
            escalation_reason: None,
        };
        self.store.insert_ticket(&ticket).await.unwrap();
        ticket
    }

    pub async fn reload(&self, id: TicketId) -> Ticket {
        self.store.ticket(id).await.unwrap().unwrap()
    }
}
