//! Deskflow Engine Library
//!
//! The assignment engine, SLA monitor and the ticket operations that share
//! their invariants, built on a guarded storage contract and a topic-based
//! notification hub, plus performance reporting over the same store.

pub mod config;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod presence;
pub mod queue;
pub mod sla_monitor;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorResponse, HandlerResult};
pub use jobs::{spawn_recurring, Engines, JobHandle};
pub use lifecycle::{NewTicket, QueueSnapshot, TicketService, TicketUpdate};
pub use metrics::MetricsService;
pub use notify::{NotificationHub, Notifier, ServerEvent, Topic};
pub use presence::AgentPresence;
pub use queue::{next_round_robin_index, AssignmentOutcome, QueueService};
pub use sla_monitor::{SlaMonitor, SlaSweep};
pub use store::{ClaimGuard, MemoryStore, PgStore, TicketStore};
