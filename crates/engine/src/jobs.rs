//! Recurring background jobs
//!
//! Each engine runs on its own fixed-interval task. A tick always runs to
//! completion; shutdown is observed only between ticks, and a tick that
//! overruns its period causes the missed ticks to be skipped, never queued.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::EngineConfig;
use crate::queue::QueueService;
use crate::sla_monitor::SlaMonitor;

/// Handle to a running recurring job
pub struct JobHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop scheduling ticks and wait for an in-flight tick to finish
    pub async fn stop(self) {
        // Err means the task already exited and dropped its receiver
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(job = self.name, error = %e, "Recurring job panicked");
        }
    }
}

/// Run `tick` every `period`, first firing one period after spawn
pub fn spawn_recurring<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> JobHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (shutdown, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(job = name, period_secs = period.as_secs(), "Recurring job started");

        loop {
            tokio::select! {
                biased;

                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    tick().await;
                }
            }
        }

        tracing::info!(job = name, "Recurring job stopped");
    });

    JobHandle {
        name,
        shutdown,
        task,
    }
}

/// Both engines running on their configured intervals
pub struct Engines {
    assignment: JobHandle,
    sla_check: JobHandle,
}

impl Engines {
    pub fn spawn(config: &EngineConfig, queue: QueueService, monitor: SlaMonitor) -> Self {
        let assignment = spawn_recurring("assignment", config.assignment_interval, move || {
            let queue = queue.clone();
            async move { queue.run_assignment_tick().await }
        });

        let sla_check = spawn_recurring("sla_check", config.sla_check_interval, move || {
            let monitor = monitor.clone();
            async move { monitor.run_sla_tick().await }
        });

        Self {
            assignment,
            sla_check,
        }
    }

    /// Stop both engines, letting in-flight ticks finish
    pub async fn shutdown(self) {
        tokio::join!(self.assignment.stop(), self.sla_check.stop());
        tracing::info!("Engines stopped");
    }
}
