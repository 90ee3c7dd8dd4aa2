//! Deskflow Shared Types and Utilities
//!
//! Domain types, errors, SLA math, performance metrics and database helpers shared by the
//! assignment/SLA engines and the worker binary.

pub mod db;
pub mod error;
pub mod metrics;
pub mod sla;
pub mod types;

pub use db::*;
pub use error::*;
pub use metrics::{
    agent_performance, realtime_metrics, sla_compliance_rate, start_of_day, AgentPerformance,
    RealtimeMetrics, TicketCounts,
};
pub use sla::{breach_kind, sla_status, BreachKind, SlaClock, SlaState, SlaStatus};
pub use types::*;
