//! Deskflow Worker
//!
//! Runs the assignment engine and the SLA monitor against PostgreSQL until
//! interrupted.
//!
//! Events go to an in-process [`NotificationHub`] with no subscribers of its
//! own. A transport (websocket server, push bridge) sharing the hub attaches
//! its clients through `NotificationHub::connect`; until one does, published
//! events are dropped.
//!
//! ## Environment Variables
//! - DATABASE_URL: PostgreSQL connection string (required)
//! - DATABASE_MAX_CONNECTIONS: pool size (default 5)
//! - ASSIGNMENT_INTERVAL_SECS / SLA_CHECK_INTERVAL_SECS: tick periods (default 10 / 60)
//! - SLA_RESPONSE_HOURS / SLA_RESOLUTION_HOURS: seed for a fresh queue configuration
//! - RUST_LOG: tracing filter; LOG_FORMAT=json switches to JSON lines

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deskflow_engine::{
    EngineConfig, Engines, NotificationHub, Notifier, PgStore, QueueService, SlaMonitor,
    TicketStore,
};
use deskflow_shared::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = EngineConfig::from_env().context("Failed to load configuration")?;

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let store: Arc<dyn TicketStore> = Arc::new(PgStore::new(pool.clone()));
    // Transports attach via NotificationHub::connect
    let hub = Arc::new(NotificationHub::new());
    let notifier: Arc<dyn Notifier> = hub.clone();

    let queue = QueueService::new(store.clone(), notifier.clone(), config.sla_policy());
    let monitor = SlaMonitor::new(store, notifier);

    let engines = Engines::spawn(&config, queue, monitor);
    tracing::info!(
        assignment_secs = config.assignment_interval.as_secs(),
        sla_check_secs = config.sla_check_interval.as_secs(),
        "Worker started"
    );

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    engines.shutdown().await;
    let stats = hub.get_stats().await;
    tracing::info!(
        connections = stats.active_connections,
        rooms = stats.active_rooms,
        "Notification hub closed"
    );
    pool.close().await;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,deskflow_engine=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
